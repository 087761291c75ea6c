use crate::assets::AssetLoader;
use crate::captions::track::CaptionTrack;
use crate::error::StoryreelError;
use crate::graph::{RenderScene, SceneGraph};
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches SRT files for scenes and turns them into caption tracks.
///
/// Caption files are cached per URL. A file that cannot be fetched is
/// remembered as missing and the scene falls back to estimated timings.
pub struct CaptionLoader {
    assets: Arc<AssetLoader>,
    cache: DashMap<String, Option<Arc<str>>>,
}

impl CaptionLoader {
    pub fn new(assets: Arc<AssetLoader>) -> Self {
        Self {
            assets,
            cache: DashMap::new(),
        }
    }

    /// Raw SRT text behind `url`, or `None` when it is unreachable
    pub fn fetch(&self, url: &str) -> Option<Arc<str>> {
        if let Some(cached) = self.cache.get(url) {
            return cached.clone();
        }

        let text = match self.load(url) {
            Ok(text) => {
                debug!(%url, bytes = text.len(), "loaded caption file");
                Some(Arc::<str>::from(text))
            }
            Err(e) => {
                warn!(%url, error = %e, "caption file unavailable, estimating word timings");
                None
            }
        };
        self.cache.entry(url.to_string()).or_insert(text).clone()
    }

    /// Read a caption file, uncached
    pub fn load(&self, url: &str) -> Result<String> {
        self.assets
            .fetch_text(url)
            .map_err(|e| StoryreelError::caption_fetch(url, format!("{:#}", e)).into())
    }

    pub fn track_for(&self, scene: &RenderScene) -> CaptionTrack {
        let srt = scene
            .captions_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .and_then(|url| self.fetch(url));

        let track = CaptionTrack::resolve(srt.as_deref(), &scene.text, scene.duration);
        if srt.is_some() && track.is_estimated() {
            warn!(scene = %scene.id, "caption file had no usable cues, estimating word timings");
        }
        track
    }

    pub fn tracks_for(&self, graph: &SceneGraph) -> Vec<CaptionTrack> {
        graph.scenes.iter().map(|s| self.track_for(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SceneGraphBuilder, UrlResolver};
    use crate::project::SceneRecord;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const BASE: &str = "http://localhost:3001";

    fn loader(storage: &std::path::Path) -> CaptionLoader {
        let assets =
            AssetLoader::new(UrlResolver::new(BASE), storage, Duration::from_secs(1)).unwrap();
        CaptionLoader::new(Arc::new(assets))
    }

    fn scene(captions: Option<&str>) -> RenderScene {
        let mut record = SceneRecord::new("s1", "Hello brave world", 3.0);
        record.captions_url = captions.map(str::to_string);
        SceneGraphBuilder::new(BASE).build_scene(&record)
    }

    #[test]
    fn test_track_from_storage_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("s1.srt"),
            "1\n00:00:00,000 --> 00:00:01,500\nHello brave\n\n2\n00:00:01,500 --> 00:00:03,000\nworld\n",
        )
        .unwrap();

        let loader = loader(dir.path());
        let track = loader.track_for(&scene(Some("s1.srt")));
        assert!(!track.is_estimated());
        assert_eq!(track.entries().len(), 2);
        assert_eq!(track.entries()[1].text, "world");
    }

    #[test]
    fn test_load_error_is_a_caption_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let err = loader(dir.path()).load("missing.srt").unwrap_err();
        match err.downcast_ref::<StoryreelError>() {
            Some(StoryreelError::CaptionFetch { url, .. }) => assert_eq!(url, "missing.srt"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_falls_back_to_estimate() {
        let dir = TempDir::new().unwrap();
        let loader = loader(dir.path());
        let track = loader.track_for(&scene(Some("missing.srt")));
        assert!(track.is_estimated());
        let text: String = track.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(text, "Hello brave world");

        // failure is cached
        assert!(loader.fetch(&format!("{}/storage/missing.srt", BASE)).is_none());
        assert_eq!(loader.assets.stats().fetches, 1);
    }

    #[test]
    fn test_malformed_file_falls_back_to_estimate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.srt"), "not a caption file at all").unwrap();
        let track = loader(dir.path()).track_for(&scene(Some("bad.srt")));
        assert!(track.is_estimated());
    }

    #[test]
    fn test_no_caption_url() {
        let dir = TempDir::new().unwrap();
        let track = loader(dir.path()).track_for(&scene(None));
        assert!(track.is_estimated());
        assert!(!track.is_empty());
    }
}
