//! CLI command execution helpers
//!
//! Wraps the `thumbgen` binary with an isolated config directory so tests
//! never read the developer's own config file.

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Temporary asset root plus a private config home
pub struct TestEnv {
    _dir: TempDir,
    pub root: PathBuf,
    pub config_home: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        let config_home = dir.path().join("config");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&config_home).unwrap();
        Self {
            _dir: dir,
            root,
            config_home,
        }
    }

    /// `thumbgen --root <root> <args>`
    pub fn thumbgen(&self, args: &[&str]) -> CommandResult {
        let output = Command::new(env!("CARGO_BIN_EXE_thumbgen"))
            .arg("--root")
            .arg(&self.root)
            .args(args)
            .env("XDG_CONFIG_HOME", &self.config_home)
            .env("HOME", &self.config_home)
            .env("RUST_LOG", "warn")
            .output()
            .expect("failed to run thumbgen");

        CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    pub fn write_png(&self, name: &str, width: u32, height: u32) {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        img.save_with_format(self.root.join(name), ImageFormat::Png).unwrap();
    }

    pub fn artifact(&self, profile: &str, key: &str) -> PathBuf {
        self.root.join(profile).join(format!("{}.jpg", key))
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Panic with both streams unless the command succeeded
    pub fn assert_success(self) -> Self {
        assert!(
            self.success(),
            "command failed ({}):\nstdout: {}\nstderr: {}",
            self.exit_code,
            self.stdout,
            self.stderr
        );
        self
    }
}

pub fn dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}
