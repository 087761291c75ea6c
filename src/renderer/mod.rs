pub mod compositor;
pub mod encoder;
pub mod engine;
pub mod external;
pub mod frame_buffer;
pub mod timeline;

pub use compositor::Compositor;
pub use encoder::VideoEncoder;
pub use engine::NativeBackend;
pub use external::ExternalBackend;
pub use frame_buffer::FrameBuffer;
pub use timeline::{SceneRange, Timeline};

use crate::graph::SceneGraph;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Turns a scene graph into a media file.
///
/// `progress` receives percentages in `0..=100`, non-decreasing.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn render(&self, graph: &SceneGraph, output: &Path, progress: &dyn Fn(u8)) -> Result<PathBuf>;
}
