//! Persisted project records as they come out of storage.
//!
//! These mirror the document store's shape: nearly everything is optional and
//! nothing is normalized. [`crate::graph::SceneGraphBuilder`] turns them into
//! fully-populated values once, at the boundary.

use crate::captions::CaptionStyle;
use crate::graph::AssetKind;
use serde::{Deserialize, Serialize};

/// A project export: the ordered scenes of one video
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub scenes: Vec<SceneRecord>,
}

/// A scene as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_scene_duration")]
    pub duration: f64,
    #[serde(default)]
    pub assets: Option<Vec<AssetRecord>>,
    #[serde(default)]
    pub captions_url: Option<String>,
    #[serde(default)]
    pub caption_style: Option<CaptionStyle>,
    /// Single-media scenes predating the multi-asset model
    #[serde(default)]
    pub media_url: Option<String>,
    /// Voiceover reference predating audio assets
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default)]
    pub sfx_urls: Vec<String>,
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

fn default_scene_duration() -> f64 {
    5.0
}

/// An asset as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub animation_type: Option<String>,
    #[serde(default)]
    pub animation_duration: Option<f64>,
    #[serde(default)]
    pub animation_delay: Option<f64>,
    #[serde(default)]
    pub animation_easing: Option<String>,
}

impl AssetRecord {
    /// A bare record with only identity fields set
    pub fn new(id: impl Into<String>, kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            thumbnail_url: None,
            name: None,
            source: None,
            x: None,
            y: None,
            width: None,
            height: None,
            scale: None,
            rotation: None,
            opacity: None,
            z_index: None,
            volume: None,
            start_time: None,
            animation_type: None,
            animation_duration: None,
            animation_delay: None,
            animation_easing: None,
        }
    }
}

impl SceneRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            duration,
            assets: None,
            captions_url: None,
            caption_style: None,
            media_url: None,
            voice_url: None,
            sfx_urls: Vec::new(),
            transition: None,
            order: None,
        }
    }

    pub fn asset_count(&self) -> usize {
        self.assets.as_ref().map_or(0, Vec::len)
    }
}
