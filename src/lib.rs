pub mod animation;
pub mod assets;
pub mod captions;
pub mod config;
pub mod error;
pub mod eval;
pub mod graph;
pub mod job;
pub mod parser;
pub mod preview;
pub mod project;
pub mod renderer;

pub use animation::{compute_transform, AnimatedTransform, AnimationType, Easing};
pub use assets::AssetLoader;
pub use captions::{CaptionLoader, CaptionStyle, CaptionTrack};
pub use config::AppConfig;
pub use error::StoryreelError;
pub use eval::{evaluate_scene, FrameState};
pub use graph::{Asset, RenderScene, SceneGraph, SceneGraphBuilder};
pub use job::{run_render_job, JobStatus, RenderJob};
pub use parser::ProjectParser;
pub use preview::PreviewSession;
pub use project::{AssetRecord, Project, SceneRecord};
pub use renderer::{ExternalBackend, NativeBackend, RenderBackend, Timeline};
