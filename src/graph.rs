//! Renderer-ready scene graph and the builder that produces it.

use crate::animation::{AnimationType, Easing};
use crate::captions::CaptionStyle;
use crate::project::{AssetRecord, SceneRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::{debug, warn};

const DEFAULT_SCENE_DURATION: f64 = 5.0;
const DEFAULT_TRANSITION: &str = "fade";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
}

impl AssetKind {
    pub fn is_visual(self) -> bool {
        !matches!(self, AssetKind::Audio)
    }
}

/// A fully-populated asset. Downstream code never checks for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Left edge, percent of frame width
    pub x: f64,
    /// Top edge, percent of frame height
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    /// Degrees, clockwise
    pub rotation: f64,
    pub opacity: f64,
    pub z_index: i32,
    pub start_time: f64,
    pub volume: f64,
    pub animation_type: AnimationType,
    pub animation_duration: f64,
    pub animation_delay: f64,
    pub animation_easing: Easing,
}

impl Asset {
    /// Asset with every field at its default
    pub fn new(id: impl Into<String>, kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            thumbnail_url: None,
            name: None,
            source: None,
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            z_index: 0,
            start_time: 0.0,
            volume: default_volume(kind),
            animation_type: AnimationType::default(),
            animation_duration: 1.0,
            animation_delay: 0.0,
            animation_easing: Easing::default(),
        }
    }

    /// Normalize a stored record. `url` is the already-resolved location.
    pub fn from_record(record: &AssetRecord, url: String) -> Self {
        let defaults = Self::new(record.id.clone(), record.kind, url);

        Self {
            thumbnail_url: record.thumbnail_url.clone(),
            name: record.name.clone(),
            source: record.source.clone(),
            x: finite_or(record.x, defaults.x),
            y: finite_or(record.y, defaults.y),
            width: positive_or(record.width, defaults.width),
            height: positive_or(record.height, defaults.height),
            // a stored zero scale means "unset"
            scale: record
                .scale
                .filter(|s| s.is_finite() && *s != 0.0)
                .unwrap_or(defaults.scale),
            rotation: finite_or(record.rotation, defaults.rotation),
            opacity: finite_or(record.opacity, defaults.opacity).clamp(0.0, 1.0),
            z_index: record.z_index.unwrap_or(defaults.z_index),
            start_time: finite_or(record.start_time, defaults.start_time).max(0.0),
            volume: finite_or(record.volume, defaults.volume).clamp(0.0, 1.0),
            animation_type: record
                .animation_type
                .as_deref()
                .map(AnimationType::parse)
                .unwrap_or(defaults.animation_type),
            animation_duration: positive_or(record.animation_duration, defaults.animation_duration),
            animation_delay: finite_or(record.animation_delay, defaults.animation_delay),
            animation_easing: record
                .animation_easing
                .as_deref()
                .map(Easing::parse)
                .unwrap_or(defaults.animation_easing),
            ..defaults
        }
    }

    pub fn is_visual(&self) -> bool {
        self.kind.is_visual()
    }
}

fn default_volume(kind: AssetKind) -> f64 {
    match kind {
        AssetKind::Audio => 1.0,
        // visual media plays muted unless a volume was set
        AssetKind::Image | AssetKind::Video => 0.0,
    }
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

/// An audio stream placed inside a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub url: String,
    /// Offset from the start of the scene, in seconds
    pub start_time: f64,
    pub volume: f64,
}

/// One scene of the render payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderScene {
    pub id: String,
    pub text: String,
    pub duration: f64,
    /// Visual layers, in paint order (lowest `zIndex` first)
    pub assets: Vec<Asset>,
    pub voiceover: Option<AudioTrack>,
    /// Audio assets other than the voiceover
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
    pub captions_url: Option<String>,
    pub caption_style: CaptionStyle,
    #[serde(default)]
    pub sfx_urls: Vec<String>,
    pub transition: String,
}

impl RenderScene {
    /// Every audio stream of the scene: voiceover, audio assets, then effects
    pub fn audio_tracks(&self) -> Vec<AudioTrack> {
        let sfx = self.sfx_urls.iter().map(|url| AudioTrack {
            url: url.clone(),
            start_time: 0.0,
            volume: 1.0,
        });
        self.voiceover
            .iter()
            .cloned()
            .chain(self.audio.iter().cloned())
            .chain(sfx)
            .collect()
    }
}

/// Self-contained input for one render job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneGraph {
    pub scenes: Vec<RenderScene>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl SceneGraph {
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }

    /// SHA-256 of the serialized graph; equal graphs render identical output
    pub fn fingerprint(&self) -> String {
        let payload = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        format!("{:x}", hasher.finalize())
    }
}

/// Resolves stored references (relative storage paths) to absolute URLs
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: String,
}

impl UrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; `/path` hangs off the base URL; bare
    /// names live under `/storage/`.
    pub fn resolve(&self, reference: &str) -> String {
        let reference = reference.trim();
        if reference.is_empty() || is_absolute_url(reference) {
            return reference.to_string();
        }
        if reference.starts_with('/') {
            format!("{}{}", self.base_url, reference)
        } else {
            format!("{}/storage/{}", self.base_url, reference)
        }
    }

    /// Path below the storage root if `url` points into our own storage
    pub fn storage_relative<'a>(&self, url: &'a str) -> Option<&'a str> {
        let rest = url.strip_prefix(self.base_url.as_str()).unwrap_or(url);
        rest.strip_prefix("/storage/")
    }
}

fn is_absolute_url(reference: &str) -> bool {
    match reference.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => reference.starts_with("data:"),
    }
}

fn is_video_url(url: &str) -> bool {
    static VIDEO_EXT: OnceLock<Regex> = OnceLock::new();
    let re = VIDEO_EXT.get_or_init(|| Regex::new(r"(?i)\.(mp4|webm|mov)$").expect("valid regex"));
    let path = url.split(['?', '#']).next().unwrap_or(url);
    re.is_match(path)
}

/// Turns stored scene records into a [`SceneGraph`]
#[derive(Debug, Clone)]
pub struct SceneGraphBuilder {
    resolver: UrlResolver,
    fps: u32,
    width: u32,
    height: u32,
}

impl SceneGraphBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            resolver: UrlResolver::new(base_url),
            fps: 30,
            width: 1920,
            height: 1080,
        }
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    #[tracing::instrument(skip_all, fields(scenes = scenes.len()))]
    pub fn build(&self, scenes: &[SceneRecord]) -> SceneGraph {
        let scenes = scenes.iter().map(|s| self.build_scene(s)).collect();
        SceneGraph {
            scenes,
            fps: self.fps,
            width: self.width,
            height: self.height,
        }
    }

    pub fn build_scene(&self, record: &SceneRecord) -> RenderScene {
        let duration = if record.duration.is_finite() && record.duration > 0.0 {
            record.duration
        } else {
            warn!(
                scene = %record.id,
                duration = record.duration,
                "non-positive scene duration, using default"
            );
            DEFAULT_SCENE_DURATION
        };

        let mut normalized: Vec<Asset> = record
            .assets
            .iter()
            .flatten()
            .map(|a| {
                if a.url.trim().is_empty() {
                    warn!(scene = %record.id, asset = %a.id, "asset has no url");
                }
                Asset::from_record(a, self.resolver.resolve(&a.url))
            })
            .collect();

        if normalized.is_empty() {
            if let Some(media) = record.media_url.as_deref().filter(|m| !m.trim().is_empty()) {
                debug!(scene = %record.id, "synthesizing asset from legacy mediaUrl");
                normalized.push(self.legacy_media_asset(&record.id, media));
            }
        }

        let (audio, mut visuals): (Vec<Asset>, Vec<Asset>) =
            normalized.into_iter().partition(|a| a.kind == AssetKind::Audio);
        visuals.sort_by_key(|a| a.z_index);

        let mut audio = audio.into_iter().map(|a| AudioTrack {
            url: a.url,
            start_time: a.start_time,
            volume: a.volume,
        });
        let voiceover = audio.next().or_else(|| {
            record
                .voice_url
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| AudioTrack {
                    url: self.resolver.resolve(v),
                    start_time: 0.0,
                    volume: 1.0,
                })
        });

        RenderScene {
            id: record.id.clone(),
            text: record.text.clone(),
            duration,
            assets: visuals,
            voiceover,
            audio: audio.collect(),
            captions_url: record
                .captions_url
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map(|c| self.resolver.resolve(c)),
            caption_style: record.caption_style.clone().unwrap_or_default(),
            sfx_urls: record
                .sfx_urls
                .iter()
                .filter(|u| !u.trim().is_empty())
                .map(|u| self.resolver.resolve(u))
                .collect(),
            transition: record
                .transition
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSITION.to_string()),
        }
    }

    fn legacy_media_asset(&self, scene_id: &str, media_url: &str) -> Asset {
        let url = self.resolver.resolve(media_url);
        let kind = if is_video_url(&url) {
            AssetKind::Video
        } else {
            AssetKind::Image
        };
        Asset {
            animation_type: AnimationType::None,
            ..Asset::new(format!("{}-media", scene_id), kind, url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3001";

    fn builder() -> SceneGraphBuilder {
        SceneGraphBuilder::new(BASE)
    }

    #[test]
    fn test_url_resolution() {
        let r = UrlResolver::new("http://localhost:3001/");
        assert_eq!(r.resolve("https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(
            r.resolve("/storage/images/a.png"),
            "http://localhost:3001/storage/images/a.png"
        );
        assert_eq!(r.resolve("images/a.png"), "http://localhost:3001/storage/images/a.png");
        assert_eq!(r.resolve(""), "");
        assert_eq!(
            r.storage_relative("http://localhost:3001/storage/captions/a.srt"),
            Some("captions/a.srt")
        );
        assert_eq!(r.storage_relative("https://cdn.example.com/a.srt"), None);
    }

    #[test]
    fn test_asset_defaults() {
        let record = AssetRecord::new("a1", AssetKind::Image, "a.png");
        let asset = Asset::from_record(&record, "http://x/a.png".into());
        assert_eq!(asset.scale, 1.0);
        assert_eq!(asset.opacity, 1.0);
        assert_eq!(asset.width, 100.0);
        assert_eq!(asset.animation_type, AnimationType::FadeIn);
        assert_eq!(asset.animation_duration, 1.0);
        assert_eq!(asset.animation_easing, Easing::EaseOut);
        assert_eq!(asset.volume, 0.0);
    }

    #[test]
    fn test_asset_sanitizes_bad_values() {
        let record = AssetRecord {
            scale: Some(0.0),
            opacity: Some(3.0),
            animation_duration: Some(-2.0),
            animation_type: Some("wobble".into()),
            animation_easing: Some("springy".into()),
            x: Some(f64::NAN),
            ..AssetRecord::new("a1", AssetKind::Image, "a.png")
        };
        let asset = Asset::from_record(&record, "a.png".into());
        assert_eq!(asset.scale, 1.0);
        assert_eq!(asset.opacity, 1.0);
        assert_eq!(asset.animation_duration, 1.0);
        assert_eq!(asset.animation_type, AnimationType::None);
        assert_eq!(asset.animation_easing, Easing::Linear);
        assert_eq!(asset.x, 0.0);
    }

    #[test]
    fn test_zero_opacity_is_kept() {
        let record = AssetRecord {
            opacity: Some(0.0),
            ..AssetRecord::new("a1", AssetKind::Image, "a.png")
        };
        assert_eq!(Asset::from_record(&record, "a.png".into()).opacity, 0.0);
    }

    #[test]
    fn test_build_separates_voiceover_and_sorts_layers() {
        let mut scene = SceneRecord::new("s1", "Hello world", 4.0);
        scene.assets = Some(vec![
            AssetRecord {
                z_index: Some(5),
                ..AssetRecord::new("top", AssetKind::Image, "images/top.png")
            },
            AssetRecord {
                volume: Some(0.5),
                ..AssetRecord::new("voice", AssetKind::Audio, "/storage/audio/v.mp3")
            },
            AssetRecord {
                z_index: Some(1),
                ..AssetRecord::new("bottom", AssetKind::Video, "https://cdn/b.mp4")
            },
            AssetRecord::new("music", AssetKind::Audio, "audio/m.mp3"),
        ]);
        scene.captions_url = Some("/storage/captions/s1.srt".into());

        let graph = builder().build(&[scene]);
        let s = &graph.scenes[0];
        let ids: Vec<&str> = s.assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["bottom", "top"]);
        assert_eq!(s.assets[1].url, "http://localhost:3001/storage/images/top.png");

        let voice = s.voiceover.as_ref().unwrap();
        assert_eq!(voice.url, "http://localhost:3001/storage/audio/v.mp3");
        assert_eq!(voice.volume, 0.5);
        assert_eq!(s.audio.len(), 1);
        assert_eq!(s.audio[0].url, "http://localhost:3001/storage/audio/m.mp3");
        assert_eq!(
            s.captions_url.as_deref(),
            Some("http://localhost:3001/storage/captions/s1.srt")
        );
        assert_eq!(s.transition, "fade");
        assert_eq!(s.audio_tracks().len(), 2);
    }

    #[test]
    fn test_legacy_media_url_becomes_asset() {
        let mut scene = SceneRecord::new("old", "text", 3.0);
        scene.media_url = Some("/storage/videos/clip.MP4".into());
        scene.voice_url = Some("/storage/audio/old.mp3".into());

        let s = builder().build_scene(&scene);
        assert_eq!(s.assets.len(), 1);
        assert_eq!(s.assets[0].kind, AssetKind::Video);
        assert_eq!(s.assets[0].animation_type, AnimationType::None);
        assert_eq!(s.assets[0].width, 100.0);
        assert_eq!(
            s.voiceover.as_ref().map(|v| v.url.as_str()),
            Some("http://localhost:3001/storage/audio/old.mp3")
        );

        scene.media_url = Some("https://images.example.com/photo.jpg?w=800".into());
        let s = builder().build_scene(&scene);
        assert_eq!(s.assets[0].kind, AssetKind::Image);
    }

    #[test]
    fn test_assets_win_over_legacy_media() {
        let mut scene = SceneRecord::new("s", "t", 2.0);
        scene.media_url = Some("legacy.png".into());
        scene.assets = Some(vec![AssetRecord::new("a", AssetKind::Image, "new.png")]);
        let s = builder().build_scene(&scene);
        assert_eq!(s.assets.len(), 1);
        assert_eq!(s.assets[0].id, "a");
    }

    #[test]
    fn test_invalid_duration_defaulted() {
        let scene = SceneRecord::new("s", "t", 0.0);
        assert_eq!(builder().build_scene(&scene).duration, DEFAULT_SCENE_DURATION);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let scenes = vec![SceneRecord::new("s", "t", 2.0)];
        let a = builder().build(&scenes);
        let b = builder().build(&scenes);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = builder().fps(60).build(&scenes);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_graph_round_trips_through_json() {
        let mut scene = SceneRecord::new("s", "t", 2.0);
        scene.assets = Some(vec![AssetRecord::new("a", AssetKind::Image, "a.png")]);
        let graph = builder().build(&[scene]);
        let json = serde_json::to_string(&graph).unwrap();
        assert!(json.contains("\"animationType\":\"fadeIn\""));
        assert!(json.contains("\"type\":\"image\""));
        let back: SceneGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
