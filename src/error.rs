use std::path::PathBuf;
use thiserror::Error;

/// Failure classes callers may want to match on. Everything else travels as
/// plain `anyhow::Error` context.
#[derive(Error, Debug)]
pub enum StoryreelError {
    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("caption fetch failed for {url}: {reason}")]
    CaptionFetch { url: String, reason: String },

    #[error("asset fetch failed for {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("renderer exited with {0}")]
    RendererFailed(String),

    #[error("renderer timed out after {0}s")]
    RendererTimeout(u64),

    #[error("ffmpeg not found. Please install ffmpeg to enable video encoding.")]
    EncoderUnavailable,

    #[error("ffmpeg encoding failed: {0}")]
    EncoderFailed(String),

    #[error("render produced no output at {0}")]
    MissingOutput(PathBuf),
}

impl StoryreelError {
    pub fn invalid_project(msg: impl Into<String>) -> Self {
        Self::InvalidProject(msg.into())
    }

    pub fn asset_fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn caption_fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::CaptionFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
