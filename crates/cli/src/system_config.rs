//! Config file discovery
//!
//! Lookup order: `--config <path>` (must exist), then
//! `<config dir>/thumbgen/config.toml` if present, then built-in defaults.

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thumbgen_core::Config;

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed with `--config`
    Explicit(PathBuf),
    /// Found at the per-user location
    UserFile(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::UserFile(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Per-user config file path (`~/.config/thumbgen/config.toml` on Linux)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("thumbgen").join("config.toml"))
}

/// Load the effective configuration
///
/// `root` overrides the configured asset root.
pub fn load(explicit: Option<&Path>, root: Option<&Path>) -> Result<(Config, ConfigSource)> {
    resolve(explicit, config_file_path().as_deref(), root)
}

/// [`load`] with the per-user location supplied by the caller
pub fn resolve(
    explicit: Option<&Path>,
    user_file: Option<&Path>,
    root: Option<&Path>,
) -> Result<(Config, ConfigSource)> {
    let (mut config, source) = match (explicit, user_file) {
        (Some(path), _) => {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (config, ConfigSource::Explicit(path.to_path_buf()))
        }
        (None, Some(path)) if path.is_file() => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (config, ConfigSource::UserFile(path.to_path_buf()))
        }
        _ => (Config::default(), ConfigSource::Defaults),
    };

    if let Some(root) = root {
        config.root = root.to_path_buf();
    }

    Ok((config, source))
}

/// Write the example config to the per-user location unless one exists
///
/// Returns the path and whether it was created.
pub fn init_if_missing() -> Result<(PathBuf, bool)> {
    let path = config_file_path().context("Could not determine config file path")?;
    let created = write_example_if_missing(&path)?;
    Ok((path, created))
}

fn write_example_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, example_config())
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(true)
}

/// Commented example configuration
pub fn example_config() -> &'static str {
    thumbgen_core::config::example_config()
}
