//! Video frame extraction
//!
//! A single still is pulled from the video by an external decoder. The
//! fallback ladder is fixed: the frame at 1s, then the very first frame.
//! There are no further retries.

use crate::error::ThumbError;
use crate::Result;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Seek offsets tried in order
pub const FRAME_OFFSETS: [Duration; 2] = [Duration::from_secs(1), Duration::ZERO];

/// Something that can hand back one encoded frame of a video
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Encoded image bytes for the frame at `offset`
    async fn grab_frame(&self, path: &Path, offset: Duration) -> Result<Vec<u8>>;
}

/// `ffmpeg` subprocess frame source
///
/// Stderr is discarded; only the single image on stdout is consumed.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, path: &Path, offset: Duration) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-ss")
            .arg(format!("{:.3}", offset.as_secs_f64()))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-c:v", "png", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl FrameSource for Ffmpeg {
    async fn grab_frame(&self, path: &Path, offset: Duration) -> Result<Vec<u8>> {
        let failed = |reason: String| ThumbError::FrameSource {
            path: path.to_path_buf(),
            reason,
        };

        let output = match tokio::time::timeout(self.timeout, self.command(path, offset).output()).await {
            Err(_) => return Err(failed(format!("timed out after {:?}", self.timeout))),
            Ok(Err(e)) => {
                return Err(failed(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(failed(format!("decoder exited with {}", output.status)));
        }
        if output.stdout.is_empty() {
            return Err(failed("decoder produced no frame".to_string()));
        }

        Ok(output.stdout)
    }
}

/// Runs the fallback ladder against a [`FrameSource`] and decodes the result
#[derive(Clone)]
pub struct FrameExtractor {
    source: Arc<dyn FrameSource>,
}

impl FrameExtractor {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }

    /// Decoded frame for a video, or [`ThumbError::FrameExtraction`]
    pub async fn extract(&self, path: &Path) -> Result<DynamicImage> {
        for offset in FRAME_OFFSETS {
            let bytes = match self.source.grab_frame(path, offset).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(path = %path.display(), ?offset, error = %e, "frame attempt failed");
                    continue;
                }
            };

            let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await?;
            match decoded {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    debug!(path = %path.display(), ?offset, error = %e, "frame output undecodable");
                }
            }
        }

        Err(ThumbError::FrameExtraction {
            path: path.to_path_buf(),
            offsets: FRAME_OFFSETS.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Fails at the listed offsets, returns a PNG otherwise
    struct ScriptedSource {
        fail_at: Vec<Duration>,
        calls: Mutex<Vec<Duration>>,
    }

    impl ScriptedSource {
        fn new(fail_at: Vec<Duration>) -> Arc<Self> {
            Arc::new(Self {
                fail_at,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Duration> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn grab_frame(&self, path: &Path, offset: Duration) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(offset);
            if self.fail_at.contains(&offset) {
                return Err(ThumbError::FrameSource {
                    path: path.to_path_buf(),
                    reason: "no frame at offset".to_string(),
                });
            }

            let mut buf = Cursor::new(Vec::new());
            RgbImage::new(64, 36)
                .write_to(&mut buf, ImageFormat::Png)
                .unwrap();
            Ok(buf.into_inner())
        }
    }

    #[tokio::test]
    async fn test_primary_offset_used_first() {
        let source = ScriptedSource::new(vec![]);
        let extractor = FrameExtractor::new(source.clone());

        let frame = extractor.extract(Path::new("clip.mp4")).await.unwrap();
        assert_eq!((frame.width(), frame.height()), (64, 36));
        assert_eq!(source.calls(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_short_clip_falls_back_to_first_frame() {
        let source = ScriptedSource::new(vec![Duration::from_secs(1)]);
        let extractor = FrameExtractor::new(source.clone());

        assert!(extractor.extract(Path::new("short.mp4")).await.is_ok());
        assert_eq!(source.calls(), vec![Duration::from_secs(1), Duration::ZERO]);
    }

    #[tokio::test]
    async fn test_both_attempts_fail() {
        let source = ScriptedSource::new(FRAME_OFFSETS.to_vec());
        let extractor = FrameExtractor::new(source.clone());

        let err = extractor.extract(Path::new("broken.mp4")).await.unwrap_err();
        assert!(matches!(err, ThumbError::FrameExtraction { .. }));
        // Exactly two attempts, no further retries
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_binary_is_attempt_failure() {
        let ffmpeg = Ffmpeg::new("/nonexistent/ffmpeg", Duration::from_secs(5));
        let err = ffmpeg
            .grab_frame(Path::new("clip.mp4"), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ThumbError::FrameSource { .. }));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg on PATH"]
    async fn test_ffmpeg_half_second_clip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let clip = temp_dir.path().join("short.mp4");

        let status = std::process::Command::new("ffmpeg")
            .args(["-loglevel", "error", "-f", "lavfi", "-i"])
            .arg("testsrc=duration=0.5:size=320x240:rate=10")
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());

        let extractor = FrameExtractor::new(Arc::new(Ffmpeg::new("ffmpeg", Duration::from_secs(30))));
        let frame = extractor.extract(&clip).await.unwrap();
        assert_eq!((frame.width(), frame.height()), (320, 240));
    }
}
