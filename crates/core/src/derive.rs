//! Derivation engine
//!
//! Turns the current content of a source asset into one JPEG per profile.
//! Content is read at settle time, never at event time, so re-deriving is
//! idempotent: the artifacts are a pure function of the source bytes and the
//! profile table.

use crate::classify::{Asset, AssetKind};
use crate::config::Config;
use crate::error::ThumbError;
use crate::profile::Profile;
use crate::store::{EvictReport, ThumbStore};
use crate::video::{Ffmpeg, FrameExtractor};
use crate::Result;
use futures::stream::{self, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a settle did for one path
#[derive(Debug)]
pub enum Outcome {
    /// Artifacts rendered (possibly partially, see [`RenderReport::failed`])
    Derived(RenderReport),
    /// The source disappeared; its artifacts were evicted instead
    Vanished(EvictReport),
    /// Not a source asset of this root
    Ignored,
}

/// Per-profile results of one render
#[derive(Debug, Default)]
pub struct RenderReport {
    pub key: String,
    pub written: Vec<PathBuf>,
    /// (profile name, error)
    pub failed: Vec<(String, ThumbError)>,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Counters from a full regeneration
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegenerateSummary {
    pub total: usize,
    pub derived: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Derivation engine
#[derive(Clone)]
pub struct Engine {
    store: ThumbStore,
    frames: FrameExtractor,
    quality: u8,
}

impl Engine {
    pub fn new(store: ThumbStore, frames: FrameExtractor, quality: u8) -> Self {
        Self {
            store,
            frames,
            quality,
        }
    }

    /// Open the store and wire up the ffmpeg frame source
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = ThumbStore::open(&config.root, config.render.profiles.clone(), &config.ignore)?;
        let ffmpeg = Ffmpeg::new(config.video.ffmpeg.clone(), config.video_timeout());
        Ok(Self::new(
            store,
            FrameExtractor::new(Arc::new(ffmpeg)),
            config.render.quality,
        ))
    }

    pub fn store(&self) -> &ThumbStore {
        &self.store
    }

    /// Settle one path: derive every profile from its current content
    ///
    /// Decode and extraction failures abort the whole settle and are not
    /// retried. A source that no longer exists is evicted instead.
    pub async fn process(&self, path: &Path) -> Result<Outcome> {
        let Some(asset) = self.store.classify(path) else {
            return Ok(Outcome::Ignored);
        };

        let frame = match self.load_frame(&asset).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(Outcome::Ignored),
            Err(e) if e.is_not_found() => {
                debug!(key = %asset.key, "source vanished before settle");
                return Ok(Outcome::Vanished(self.store.evict(&asset.key).await));
            }
            Err(e) => return Err(e),
        };

        let report = self.render(&asset.key, frame).await?;

        // A removal that raced this derivation must win
        if !tokio::fs::try_exists(&asset.path).await.unwrap_or(false) {
            debug!(key = %asset.key, "source removed during derivation");
            return Ok(Outcome::Vanished(self.store.evict(&asset.key).await));
        }

        Ok(Outcome::Derived(report))
    }

    async fn load_frame(&self, asset: &Asset) -> Result<Option<DynamicImage>> {
        match asset.kind {
            AssetKind::Image => {
                let bytes = tokio::fs::read(&asset.path)
                    .await
                    .map_err(|e| ThumbError::io(&asset.path, e))?;
                let path = asset.path.clone();
                let frame = tokio::task::spawn_blocking(move || {
                    image::load_from_memory(&bytes).map_err(|source| ThumbError::Decode { path, source })
                })
                .await??;
                Ok(Some(frame))
            }
            AssetKind::Video => {
                tokio::fs::metadata(&asset.path)
                    .await
                    .map_err(|e| ThumbError::io(&asset.path, e))?;
                Ok(Some(self.frames.extract(&asset.path).await?))
            }
            AssetKind::Ignored => Ok(None),
        }
    }

    /// Resize and write `frame` for every profile
    ///
    /// Each profile is independent; a failed profile is logged and reported
    /// without stopping the others.
    pub async fn render(&self, key: &str, frame: DynamicImage) -> Result<RenderReport> {
        let store = self.store.clone();
        let key = key.to_string();
        let quality = self.quality;

        let report = tokio::task::spawn_blocking(move || {
            let rgb = frame.to_rgb8();
            let mut report = RenderReport {
                key,
                ..Default::default()
            };

            for profile in store.profiles() {
                let written = encode_jpeg(&rgb, profile, quality)
                    .and_then(|bytes| store.write_artifact(profile, &report.key, &bytes));
                match written {
                    Ok(path) => report.written.push(path),
                    Err(e) => {
                        warn!(key = %report.key, profile = %profile.name, error = %e, "failed to write artifact");
                        report.failed.push((profile.name.clone(), e));
                    }
                }
            }

            report
        })
        .await?;

        Ok(report)
    }

    /// Evict every artifact of the asset at `path`
    ///
    /// `None` when the path is not a source asset of this root.
    pub async fn evict(&self, path: &Path) -> Option<EvictReport> {
        let asset = self.store.classify(path)?;
        Some(self.store.evict(&asset.key).await)
    }

    /// Re-derive every asset in the root, `concurrency` at a time
    pub async fn regenerate_all<F>(&self, concurrency: usize, mut on_done: F) -> Result<RegenerateSummary>
    where
        F: FnMut(&Asset, &Result<Outcome>),
    {
        let store = self.store.clone();
        let assets = tokio::task::spawn_blocking(move || store.list_assets()).await??;

        let mut summary = RegenerateSummary {
            total: assets.len(),
            ..Default::default()
        };

        let mut results = stream::iter(assets)
            .map(|asset| async move {
                let result = self.process(&asset.path).await;
                (asset, result)
            })
            .buffer_unordered(concurrency.max(1));

        while let Some((asset, result)) = results.next().await {
            match &result {
                Ok(Outcome::Derived(report)) if report.is_complete() => summary.derived += 1,
                Ok(Outcome::Derived(_)) => summary.partial += 1,
                Ok(_) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
            on_done(&asset, &result);
        }

        Ok(summary)
    }
}

/// Fit `rgb` inside the profile bounds (Lanczos3) and encode as JPEG
pub fn encode_jpeg(rgb: &RgbImage, profile: &Profile, quality: u8) -> Result<Vec<u8>> {
    let (w, h) = profile.fit(rgb.width(), rgb.height());

    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        let encoded = if (w, h) == rgb.dimensions() {
            encoder.encode_image(rgb)
        } else {
            encoder.encode_image(&imageops::resize(rgb, w, h, FilterType::Lanczos3))
        };
        encoded.map_err(|source| ThumbError::Encode {
            profile: profile.name.clone(),
            source,
        })?;
    }

    Ok(buf)
}
