use crate::error::StoryreelError;
use crate::graph::UrlResolver;
use anyhow::{Context, Result};
use dashmap::DashMap;
use image::RgbaImage;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where the bytes behind an asset URL live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Local(PathBuf),
    Remote(String),
}

/// Fetches asset bytes from local storage or over HTTP and caches decoded
/// images. Shared across render workers.
pub struct AssetLoader {
    resolver: UrlResolver,
    storage_path: PathBuf,
    client: reqwest::blocking::Client,
    images: DashMap<String, Option<Arc<RgbaImage>>>,
    fetches: AtomicUsize,
    failures: AtomicUsize,
}

impl AssetLoader {
    pub fn new(
        resolver: UrlResolver,
        storage_path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            resolver,
            storage_path: storage_path.as_ref().to_path_buf(),
            client,
            images: DashMap::new(),
            fetches: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Map a resolved URL onto local storage when it points there
    pub fn locate(&self, url: &str) -> AssetLocation {
        if let Some(relative) = self.resolver.storage_relative(url) {
            let relative = Path::new(relative);
            if relative.components().all(|c| matches!(c, Component::Normal(_))) {
                return AssetLocation::Local(self.storage_path.join(relative));
            }
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return AssetLocation::Remote(url.to_string());
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        AssetLocation::Local(PathBuf::from(path))
    }

    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let result = match self.locate(url) {
            AssetLocation::Local(path) => std::fs::read(&path)
                .with_context(|| format!("Failed to read asset file: {}", path.display())),
            AssetLocation::Remote(url) => self.fetch_remote(&url),
        };
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "fetching remote asset");
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|e| StoryreelError::asset_fetch(url, e))?;

        if !res.status().is_success() {
            return Err(StoryreelError::asset_fetch(url, res.status()).into());
        }
        let bytes = res
            .bytes()
            .with_context(|| format!("Failed to read response body: {}", url))?;
        Ok(bytes.to_vec())
    }

    pub fn fetch_text(&self, url: &str) -> Result<String> {
        let bytes = self.fetch_bytes(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode an image once; failures are remembered so a broken URL is not
    /// retried on every frame.
    pub fn load_image(&self, url: &str) -> Option<Arc<RgbaImage>> {
        if url.is_empty() {
            return None;
        }
        if let Some(cached) = self.images.get(url) {
            return cached.clone();
        }

        let decoded = self
            .fetch_bytes(url)
            .and_then(|bytes| {
                image::load_from_memory(&bytes)
                    .with_context(|| format!("Failed to decode image: {}", url))
            })
            .map(|img| Arc::new(img.to_rgba8()));

        let entry = match decoded {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(%url, error = %e, "image unavailable, painting placeholder");
                None
            }
        };
        self.images.entry(url.to_string()).or_insert(entry).clone()
    }

    pub fn stats(&self) -> AssetStats {
        let cached_images = self.images.iter().filter(|e| e.value().is_some()).count();
        AssetStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cached_images,
        }
    }

    pub fn clear(&self) {
        self.images.clear();
    }
}

/// Statistics about fetched assets
#[derive(Debug, Clone)]
pub struct AssetStats {
    pub fetches: usize,
    pub failures: usize,
    pub cached_images: usize,
}

impl std::fmt::Display for AssetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fetches: {}, Failures: {}, Cached images: {}",
            self.fetches, self.failures, self.cached_images
        )
    }
}
