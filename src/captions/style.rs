use serde::{Deserialize, Serialize};

/// Where the caption box sits on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Top,
    Center,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

/// CSS-style font weight: either a keyword or a numeric weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(u32),
    Named(String),
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::Named("medium".to_string())
    }
}

impl FontWeight {
    pub fn is_bold(&self) -> bool {
        match self {
            FontWeight::Numeric(w) => *w >= 600,
            FontWeight::Named(name) => matches!(name.as_str(), "bold" | "bolder"),
        }
    }
}

/// Visual styling for a scene's captions.
///
/// Every field is defaulted, so a partial (or empty) style object from storage
/// deserializes into a complete value. Nothing here affects caption timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStyle {
    pub position: CaptionPosition,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub font_size: f64,
    pub max_width: f64,
    pub padding: f64,
    pub background_color: String,
    pub background_opacity: f64,
    pub text_color: String,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub text_align: TextAlign,
    pub border_width: f64,
    pub border_color: String,
    pub border_radius: f64,
    pub shadow: bool,
    pub blur: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            position: CaptionPosition::Bottom,
            x: None,
            y: None,
            font_size: 18.0,
            max_width: 800.0,
            padding: 12.0,
            background_color: "#000000".to_string(),
            background_opacity: 0.75,
            text_color: "#ffffff".to_string(),
            font_family: "Arial".to_string(),
            font_weight: FontWeight::default(),
            text_align: TextAlign::Center,
            border_width: 0.0,
            border_color: "#ffffff".to_string(),
            border_radius: 8.0,
            shadow: false,
            blur: 0.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

impl CaptionStyle {
    /// Centre of the caption box, in percent of the frame.
    pub fn anchor(&self) -> (f64, f64) {
        let x = self.x.unwrap_or(50.0);
        let y = match self.position {
            CaptionPosition::Top => self.y.unwrap_or(5.0),
            CaptionPosition::Center => self.y.unwrap_or(50.0),
            CaptionPosition::Bottom | CaptionPosition::Custom => self.y.unwrap_or(80.0),
        };
        (x, y)
    }

    /// Background colour with the box opacity folded into alpha
    pub fn background_rgba(&self) -> [u8; 4] {
        let [r, g, b, a] = parse_hex_color(&self.background_color).unwrap_or([0, 0, 0, 255]);
        let alpha = (a as f64 / 255.0)
            * self.background_opacity.clamp(0.0, 1.0)
            * self.opacity.clamp(0.0, 1.0);
        [r, g, b, (alpha * 255.0).round() as u8]
    }

    pub fn text_rgba(&self) -> [u8; 4] {
        let [r, g, b, a] = parse_hex_color(&self.text_color).unwrap_or([255, 255, 255, 255]);
        let alpha = (a as f64 / 255.0) * self.opacity.clamp(0.0, 1.0);
        [r, g, b, (alpha * 255.0).round() as u8]
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.trim().strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 | 8 => {
            let r = channel(hex.get(0..2)?)?;
            let g = channel(hex.get(2..4)?)?;
            let b = channel(hex.get(4..6)?)?;
            let a = if hex.len() == 8 { channel(hex.get(6..8)?)? } else { 255 };
            Some([r, g, b, a])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_fully_defaulted() {
        let style: CaptionStyle = serde_json::from_str("{}").unwrap();
        assert_eq!(style, CaptionStyle::default());
        assert_eq!(style.font_size, 18.0);
        assert_eq!(style.anchor(), (50.0, 80.0));
    }

    #[test]
    fn test_partial_style() {
        let json = r##"{"position": "top", "fontWeight": 700, "textColor": "#ff0000"}"##;
        let style: CaptionStyle = serde_json::from_str(json).unwrap();
        assert_eq!(style.position, CaptionPosition::Top);
        assert!(style.font_weight.is_bold());
        assert_eq!(style.anchor(), (50.0, 5.0));
        assert_eq!(style.text_rgba(), [255, 0, 0, 255]);
        assert_eq!(style.max_width, 800.0);
    }

    #[test]
    fn test_custom_anchor() {
        let style = CaptionStyle {
            position: CaptionPosition::Custom,
            x: Some(20.0),
            y: Some(30.0),
            ..Default::default()
        };
        assert_eq!(style.anchor(), (20.0, 30.0));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#0ea5e9"), Some([14, 165, 233, 255]));
        assert_eq!(parse_hex_color("#00000080"), Some([0, 0, 0, 128]));
        assert_eq!(parse_hex_color("rgba(0,0,0,1)"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn test_background_alpha() {
        let style = CaptionStyle::default();
        assert_eq!(style.background_rgba(), [0, 0, 0, 191]);
    }
}
