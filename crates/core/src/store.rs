//! On-disk artifact store
//!
//! Manages the asset root and its profile sub-areas:
//! ```text
//! uploads/
//!   cat.png          <- source assets (flat)
//!   clip.mp4
//!   .thumbignore     <- optional ignore patterns
//!   320x200/
//!     cat.jpg        <- one artifact per (source key, profile)
//!     clip.jpg
//!   800x600/
//!     cat.jpg
//!     clip.jpg
//! ```
//! The directory tree is the only state; nothing else is persisted.

use crate::classify::Asset;
use crate::error::ThumbError;
use crate::ignore::{IgnoreConfig, IgnoreRules};
use crate::profile::Profile;
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extension of every derived artifact, regardless of source format
pub const ARTIFACT_EXT: &str = "jpg";

/// Handle to the asset root and its profile sub-areas
///
/// Cheap to clone; all clones share the same profile table and ignore rules.
#[derive(Debug, Clone)]
pub struct ThumbStore {
    /// Canonical asset root
    root: PathBuf,
    profiles: Arc<[Profile]>,
    ignore: Arc<IgnoreRules>,
}

impl ThumbStore {
    /// Open the store, creating the root and every profile sub-area
    ///
    /// Failure here is fatal for the caller: artifacts cannot be kept
    /// consistent without the sub-areas.
    pub fn open(root: &Path, profiles: Vec<Profile>, ignore: &IgnoreConfig) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| ThumbError::io(root, e))?;
        let root = fs::canonicalize(root).map_err(|e| ThumbError::io(root, e))?;

        for profile in &profiles {
            let dir = root.join(&profile.name);
            fs::create_dir_all(&dir).map_err(|e| ThumbError::io(&dir, e))?;
        }

        let ignore = IgnoreRules::load(&root, ignore)?;

        Ok(Self {
            root,
            profiles: profiles.into(),
            ignore: Arc::new(ignore),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile_dir(&self, profile: &Profile) -> PathBuf {
        self.root.join(&profile.name)
    }

    /// `<root>/<profile>/<key>.jpg`
    pub fn artifact_path(&self, profile: &Profile, key: &str) -> PathBuf {
        self.profile_dir(profile).join(artifact_name(key))
    }

    /// True for paths inside any profile sub-area, including the sub-area itself
    pub fn is_in_profile_area(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        match rel.components().next() {
            Some(Component::Normal(first)) => self.profiles.iter().any(|p| first == p.name.as_str()),
            _ => false,
        }
    }

    /// Classify a path as a source asset of this root
    ///
    /// Only direct children of the root count; hidden names, ignore-rule
    /// matches and unknown extensions yield `None`.
    pub fn classify(&self, path: &Path) -> Option<Asset> {
        if path.parent() != Some(self.root.as_path()) {
            return None;
        }
        if self.ignore.should_ignore(path) {
            return None;
        }
        Asset::from_path(path)
    }

    /// Scan the root (non-recursive) for source assets, sorted by key
    pub fn list_assets(&self) -> Result<Vec<Asset>> {
        let entries = fs::read_dir(&self.root).map_err(|e| ThumbError::io(&self.root, e))?;

        let mut assets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ThumbError::io(&self.root, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                continue;
            }
            if let Some(asset) = self.classify(&entry.path()) {
                assets.push(asset);
            }
        }

        assets.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.path.cmp(&b.path)));
        Ok(assets)
    }

    /// Source keys of every asset currently in the root
    pub fn valid_keys(&self) -> Result<HashSet<String>> {
        Ok(self.list_assets()?.into_iter().map(|a| a.key).collect())
    }

    /// Atomically write one artifact (blocking)
    ///
    /// The bytes go to a hidden temp file in the sub-area which is then renamed
    /// over the final name, so readers never observe a partial JPEG.
    pub fn write_artifact(&self, profile: &Profile, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.profile_dir(profile);
        let dest = dir.join(artifact_name(key));

        let mut tmp = tempfile::Builder::new()
            .prefix(".thumb-")
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(|e| ThumbError::io(&dir, e))?;

        tmp.write_all(bytes).map_err(|e| ThumbError::io(tmp.path(), e))?;

        // tempfile creates 0600 files; artifacts are served to other users
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|e| ThumbError::io(tmp.path(), e))?;
        }

        tmp.persist(&dest).map_err(|e| ThumbError::io(&dest, e.error))?;
        Ok(dest)
    }

    /// Delete the artifact of `key` in every profile sub-area
    ///
    /// Missing artifacts are not an error.
    pub async fn evict(&self, key: &str) -> EvictReport {
        let mut report = EvictReport::default();

        for profile in self.profiles.iter() {
            let path = self.artifact_path(profile, key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "evicted artifact");
                    report.removed.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => report.failed.push((path, e)),
            }
        }

        report
    }
}

/// `<key>.jpg`
pub fn artifact_name(key: &str) -> String {
    format!("{}.{}", key, ARTIFACT_EXT)
}

/// Result of evicting one source key
#[derive(Debug, Default)]
pub struct EvictReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &Path) -> ThumbStore {
        ThumbStore::open(dir, Profile::defaults(), &IgnoreConfig::default()).unwrap()
    }

    #[test]
    fn test_open_creates_profile_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");
        let store = open_store(&root);

        assert!(store.root().join("320x200").is_dir());
        assert!(store.root().join("800x600").is_dir());
    }

    #[test]
    fn test_artifact_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());
        let profile = &store.profiles()[0];

        assert_eq!(
            store.artifact_path(profile, "cat"),
            store.root().join("320x200").join("cat.jpg")
        );
    }

    #[test]
    fn test_profile_area_detection() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());
        let root = store.root();

        assert!(store.is_in_profile_area(&root.join("320x200")));
        assert!(store.is_in_profile_area(&root.join("800x600/cat.jpg")));
        assert!(!store.is_in_profile_area(&root.join("cat.png")));
        assert!(!store.is_in_profile_area(&root.join("320x2000/cat.jpg")));
        assert!(!store.is_in_profile_area(Path::new("/elsewhere/320x200/cat.jpg")));
    }

    #[test]
    fn test_classify_only_direct_children() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());
        let root = store.root();

        assert!(store.classify(&root.join("cat.png")).is_some());
        assert!(store.classify(&root.join("nested/cat.png")).is_none());
        assert!(store.classify(&root.join("320x200/cat.jpg")).is_none());
        assert!(store.classify(&root.join(".cat.png")).is_none());
    }

    #[test]
    fn test_list_assets_skips_dirs_and_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());
        let root = store.root();

        fs::write(root.join("b.mp4"), b"video").unwrap();
        fs::write(root.join("a.png"), b"image").unwrap();
        fs::write(root.join("notes.txt"), b"text").unwrap();
        fs::write(root.join(".hidden.png"), b"image").unwrap();
        fs::create_dir(root.join("album.png")).unwrap();

        let keys: Vec<_> = store.list_assets().unwrap().into_iter().map(|a| a.key).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_write_artifact_replaces_atomically() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());
        let profile = store.profiles()[0].clone();

        let path = store.write_artifact(&profile, "cat", b"first").unwrap();
        store.write_artifact(&profile, "cat", b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temp files left behind
        let entries: Vec<_> = fs::read_dir(store.profile_dir(&profile)).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_removes_all_profiles() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());

        for profile in store.profiles().to_vec() {
            store.write_artifact(&profile, "cat", b"jpeg").unwrap();
        }

        let report = store.evict("cat").await;
        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
        for profile in store.profiles() {
            assert!(!store.artifact_path(profile, "cat").exists());
        }
    }

    #[tokio::test]
    async fn test_evict_missing_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path());

        let report = store.evict("ghost").await;
        assert!(report.removed.is_empty());
        assert!(report.failed.is_empty());
    }
}
