//! Configuration model
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ThumbError;
use crate::ignore::IgnoreConfig;
use crate::profile::Profile;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Watched asset root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a burst of writes is settled
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum concurrent derivations
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Periodic reconciliation interval; 0 disables it
    #[serde(default)]
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,

    #[serde(default = "Profile::defaults")]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Decoder binary
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Per-attempt timeout
    #[serde(default = "default_video_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily rolling log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            watch: WatchConfig::default(),
            render: RenderConfig::default(),
            video: VideoConfig::default(),
            ignore: IgnoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            workers: default_workers(),
            reconcile_interval_secs: 0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            profiles: Profile::defaults(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            timeout_secs: default_video_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_workers() -> usize {
    4
}

fn default_quality() -> u8 {
    80
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_video_timeout() -> u64 {
    30
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(|e| ThumbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ThumbError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ThumbError::Config(e.to_string()))
    }

    /// Validate ranges and the profile table
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ThumbError::Config(msg));

        if !(10..=60_000).contains(&self.watch.debounce_ms) {
            return invalid(format!(
                "watch.debounce_ms must be 10-60000, got {}",
                self.watch.debounce_ms
            ));
        }
        if !(1..=256).contains(&self.watch.workers) {
            return invalid(format!("watch.workers must be 1-256, got {}", self.watch.workers));
        }
        if !(1..=100).contains(&self.render.quality) {
            return invalid(format!("render.quality must be 1-100, got {}", self.render.quality));
        }
        if self.video.timeout_secs == 0 {
            return invalid("video.timeout_secs must be positive".to_string());
        }
        if self.render.profiles.is_empty() {
            return invalid("at least one render profile is required".to_string());
        }

        let mut names = HashSet::new();
        for profile in &self.render.profiles {
            let name = profile.name.as_str();
            if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
                return invalid(format!("profile name {:?} is not a plain directory name", name));
            }
            if profile.max_width == 0 || profile.max_height == 0 {
                return invalid(format!("profile {} has a zero dimension", name));
            }
            if !names.insert(name) {
                return invalid(format!("duplicate profile name {}", name));
            }
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video.timeout_secs)
    }

    /// `None` when periodic reconciliation is disabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        match self.watch.reconcile_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Commented example configuration
pub fn example_config() -> &'static str {
    r#"# thumbgen configuration

# Directory holding the uploaded assets (watched non-recursively)
root = "./uploads"

[watch]
# Quiet period (ms) before a burst of writes is processed
debounce_ms = 500
# Maximum concurrent derivations
workers = 4
# Periodic orphan cleanup interval in seconds (0 = only at startup)
reconcile_interval_secs = 0

[render]
# JPEG quality of the artifacts (1-100)
quality = 80

[[render.profiles]]
name = "320x200"
max_width = 320
max_height = 200

[[render.profiles]]
name = "800x600"
max_width = 800
max_height = 600

[video]
ffmpeg = "ffmpeg"
# Timeout per frame extraction attempt
timeout_secs = 30

[ignore]
# Read gitignore-style patterns from <root>/.thumbignore
use_ignore_file = true
patterns = []

[logging]
level = "info"
# dir = "/var/log/thumbgen"
"#
}
