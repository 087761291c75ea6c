use crate::animation::Easing;
use crate::graph::Asset;
use serde::{Deserialize, Serialize};

/// Slide distance in percentage units
const SLIDE_DISTANCE: f64 = 100.0;
/// Ken Burns zoom gained over a full scene
const KEN_BURNS_ZOOM: f64 = 0.2;
/// Ken Burns pan (percentage units) over a full scene
const KEN_BURNS_PAN: f64 = 5.0;

/// Entrance animation applied to a visual asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum AnimationType {
    None,
    #[default]
    FadeIn,
    SlideInLeft,
    SlideInRight,
    SlideInTop,
    SlideInBottom,
    ZoomIn,
    ZoomOut,
    RotateIn,
    KenBurns,
}

impl AnimationType {
    pub const ALL: [AnimationType; 10] = [
        AnimationType::None,
        AnimationType::FadeIn,
        AnimationType::SlideInLeft,
        AnimationType::SlideInRight,
        AnimationType::SlideInTop,
        AnimationType::SlideInBottom,
        AnimationType::ZoomIn,
        AnimationType::ZoomOut,
        AnimationType::RotateIn,
        AnimationType::KenBurns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationType::None => "none",
            AnimationType::FadeIn => "fadeIn",
            AnimationType::SlideInLeft => "slideInLeft",
            AnimationType::SlideInRight => "slideInRight",
            AnimationType::SlideInTop => "slideInTop",
            AnimationType::SlideInBottom => "slideInBottom",
            AnimationType::ZoomIn => "zoomIn",
            AnimationType::ZoomOut => "zoomOut",
            AnimationType::RotateIn => "rotateIn",
            AnimationType::KenBurns => "kenBurns",
        }
    }

    /// Parse an animation name. Unknown names mean no animation.
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .unwrap_or(AnimationType::None)
    }

    pub fn is_known(name: &str) -> bool {
        Self::ALL.iter().any(|a| a.as_str() == name)
    }

    /// Whether the animation reaches a settled state inside its envelope.
    pub fn settles(self) -> bool {
        self != AnimationType::KenBurns
    }
}

impl From<String> for AnimationType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

/// Visual state of an asset at one instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimatedTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl AnimatedTransform {
    /// The asset's static placement with no animation applied
    pub fn base(asset: &Asset) -> Self {
        Self {
            x: asset.x,
            y: asset.y,
            scale: asset.scale,
            rotation: asset.rotation,
            opacity: asset.opacity,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0 && self.scale > 0.0
    }
}

/// Raw (un-eased) progress through the delay/duration envelope.
///
/// A non-positive or non-finite duration jumps straight from 0 to 1 at the
/// delay. Negative or NaN time counts as "before the start".
pub fn envelope_progress(current_time: f64, delay: f64, duration: f64) -> f64 {
    if current_time.is_nan() || current_time < delay {
        return 0.0;
    }
    if !(duration.is_finite() && duration > 0.0) {
        return 1.0;
    }
    let end = delay + duration;
    if current_time >= end {
        1.0
    } else {
        (current_time - delay) / duration
    }
}

/// Progress of a whole-scene effect, guarded against empty scenes.
fn scene_progress(current_time: f64, scene_duration: f64) -> f64 {
    if !(scene_duration.is_finite() && scene_duration > 0.0) {
        return 1.0;
    }
    if current_time.is_nan() {
        return 0.0;
    }
    (current_time / scene_duration).clamp(0.0, 1.0)
}

/// Evaluate an asset's animation at `current_time` seconds into its scene.
///
/// Pure: the same `(asset, current_time, scene_duration)` always yields the
/// same transform. Called once per asset per frame.
pub fn compute_transform(
    asset: &Asset,
    current_time: f64,
    scene_duration: f64,
) -> AnimatedTransform {
    let base = AnimatedTransform::base(asset);

    if asset.animation_type == AnimationType::KenBurns {
        let p = scene_progress(current_time, scene_duration);
        return AnimatedTransform {
            x: base.x - KEN_BURNS_PAN * p,
            y: base.y - KEN_BURNS_PAN * p,
            scale: base.scale * (1.0 + KEN_BURNS_ZOOM * p),
            ..base
        };
    }

    let raw = envelope_progress(current_time, asset.animation_delay, asset.animation_duration);
    let p = asset.animation_easing.apply(raw);
    let faded = base.opacity * p;
    let remaining = 1.0 - p;

    match asset.animation_type {
        AnimationType::FadeIn => AnimatedTransform { opacity: faded, ..base },
        AnimationType::SlideInLeft => AnimatedTransform {
            x: base.x - SLIDE_DISTANCE * remaining,
            opacity: faded,
            ..base
        },
        AnimationType::SlideInRight => AnimatedTransform {
            x: base.x + SLIDE_DISTANCE * remaining,
            opacity: faded,
            ..base
        },
        AnimationType::SlideInTop => AnimatedTransform {
            y: base.y - SLIDE_DISTANCE * remaining,
            opacity: faded,
            ..base
        },
        AnimationType::SlideInBottom => AnimatedTransform {
            y: base.y + SLIDE_DISTANCE * remaining,
            opacity: faded,
            ..base
        },
        AnimationType::ZoomIn => AnimatedTransform {
            scale: base.scale * (0.5 + 0.5 * p),
            opacity: faded,
            ..base
        },
        AnimationType::ZoomOut => AnimatedTransform {
            scale: base.scale * (1.5 - 0.5 * p),
            opacity: faded,
            ..base
        },
        AnimationType::RotateIn => AnimatedTransform {
            rotation: base.rotation + 360.0 * remaining,
            opacity: faded,
            ..base
        },
        AnimationType::None | AnimationType::KenBurns => base,
    }
}
