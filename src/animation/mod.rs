pub mod easing;
pub mod transform;

pub use easing::Easing;
pub use transform::{compute_transform, AnimatedTransform, AnimationType};
