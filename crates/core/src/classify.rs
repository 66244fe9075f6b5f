//! Asset classification
//!
//! Maps a file name to an asset kind by extension and derives the source key
//! that ties an asset to its artifacts.

use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Video,
    Ignored,
}

/// Classify a file name (not a path)
///
/// Hidden names are always ignored. Extension matching is case-insensitive.
pub fn classify(file_name: &str) -> AssetKind {
    if file_name.starts_with('.') {
        return AssetKind::Ignored;
    }

    let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
        return AssetKind::Ignored;
    };
    let ext = ext.to_ascii_lowercase();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        AssetKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        AssetKind::Video
    } else {
        AssetKind::Ignored
    }
}

/// File name with its last extension stripped: `clip.final.mp4` -> `clip.final`
pub fn source_key(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// A classified source asset in the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub key: String,
    pub kind: AssetKind,
}

impl Asset {
    /// Classify a path by its file name; `None` for ignored names
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        match classify(name) {
            AssetKind::Ignored => None,
            kind => Some(Self {
                path: path.to_path_buf(),
                key: source_key(name).to_string(),
                kind,
            }),
        }
    }
}
