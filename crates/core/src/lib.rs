//! Core of the thumbnail generator
//!
//! This crate provides:
//! - Output profiles and the fit-within-bounds geometry
//! - Asset classification and source keys
//! - The artifact store (profile sub-areas, atomic writes, eviction)
//! - The derivation engine (image decode, video frames, multi-profile render)
//! - Configuration and the error taxonomy

pub mod classify;
pub mod config;
pub mod derive;
pub mod error;
pub mod ignore;
pub mod profile;
pub mod store;
pub mod video;

// Re-exports
pub use classify::{classify, source_key, Asset, AssetKind};
pub use config::Config;
pub use derive::{Engine, Outcome, RegenerateSummary, RenderReport};
pub use error::ThumbError;
pub use crate::ignore::{IgnoreConfig, IgnoreRules};
pub use profile::Profile;
pub use store::{EvictReport, ThumbStore, ARTIFACT_EXT};
pub use video::{Ffmpeg, FrameExtractor, FrameSource};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ThumbError>;
