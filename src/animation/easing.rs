use serde::{Deserialize, Serialize};

/// Easing curve applied to normalized animation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum Easing {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
}

impl Easing {
    pub const ALL: [Easing; 4] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
    ];

    /// Map progress through this curve.
    ///
    /// Input is clamped to `[0, 1]`; callers pass raw elapsed/duration ratios
    /// that can overshoot. NaN is treated as 0.
    pub fn apply(self, progress: f64) -> f64 {
        let p = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };

        match self {
            Easing::Linear => p,
            Easing::EaseIn => p * p,
            Easing::EaseOut => 1.0 - (1.0 - p) * (1.0 - p),
            Easing::EaseInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "easeIn",
            Easing::EaseOut => "easeOut",
            Easing::EaseInOut => "easeInOut",
        }
    }

    /// Parse an easing name. Unknown names fall back to linear.
    pub fn parse(name: &str) -> Self {
        match name {
            "easeIn" => Easing::EaseIn,
            "easeOut" => Easing::EaseOut,
            "easeInOut" => Easing::EaseInOut,
            _ => Easing::Linear,
        }
    }

    pub fn is_known(name: &str) -> bool {
        Self::ALL.iter().any(|e| e.as_str() == name)
    }
}

impl From<String> for Easing {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

/// Free-function form used by the per-frame code paths.
pub fn ease(progress: f64, kind: Easing) -> f64 {
    kind.apply(progress)
}
