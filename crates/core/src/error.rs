//! Error taxonomy for derivation, storage and configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumbError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Corrupt, truncated or unsupported asset
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode artifact for profile {profile}: {source}")]
    Encode {
        profile: String,
        #[source]
        source: image::ImageError,
    },

    /// Every attempt of the frame fallback ladder failed
    #[error("could not extract a frame from {path} (tried offsets {offsets:?})")]
    FrameExtraction {
        path: PathBuf,
        offsets: Vec<Duration>,
    },

    #[error("frame source failed for {path}: {reason}")]
    FrameSource { path: PathBuf, reason: String },

    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] ::ignore::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ThumbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
