//! Ignore pattern management
//!
//! Supports two sources of ignore patterns:
//! 1. Built-in rules (hidden entries, editor backups - always active)
//! 2. Gitignore-style patterns from config and the optional `.thumbignore`
//!    file in the asset root

use crate::Result;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the per-root ignore file
pub const IGNORE_FILE: &str = ".thumbignore";

/// Ignore rule set shared by the router, the reconciler and regeneration
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    /// Compiled config + `.thumbignore` patterns
    patterns: Option<Gitignore>,
}

impl IgnoreRules {
    /// Load rules for an asset root
    pub fn load(root: &Path, config: &IgnoreConfig) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let mut sources = 0;

        if config.use_ignore_file {
            let ignore_file = root.join(IGNORE_FILE);
            if ignore_file.is_file() {
                if let Some(err) = builder.add(&ignore_file) {
                    return Err(err.into());
                }
                sources += 1;
            }
        }

        for pattern in &config.patterns {
            builder.add_line(None, pattern)?;
            sources += 1;
        }

        let patterns = if sources > 0 {
            Some(builder.build()?)
        } else {
            None
        };

        Ok(Self { patterns })
    }

    /// Check if a file should be ignored
    pub fn should_ignore(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };

        if is_builtin_ignored(name) {
            return true;
        }

        match &self.patterns {
            Some(patterns) => patterns.matched(path, false).is_ignore(),
            None => false,
        }
    }
}

/// Hidden entries (including upload temp files like `.part-*`) and editor backups
fn is_builtin_ignored(name: &str) -> bool {
    name.starts_with('.') || name.ends_with('~')
}

/// Ignore configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Read `.thumbignore` from the asset root (default: true)
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_ignore_file: true,
            patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_rules_always_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let rules = IgnoreRules::load(temp_dir.path(), &IgnoreConfig::default()).unwrap();

        assert!(rules.should_ignore(&temp_dir.path().join(".cat.png")));
        assert!(rules.should_ignore(&temp_dir.path().join("cat.png~")));
        assert!(!rules.should_ignore(&temp_dir.path().join("cat.png")));
    }

    #[test]
    fn test_config_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let config = IgnoreConfig {
            use_ignore_file: false,
            patterns: vec!["*.partial.mp4".to_string(), "draft_*".to_string()],
        };
        let rules = IgnoreRules::load(temp_dir.path(), &config).unwrap();

        assert!(rules.should_ignore(&temp_dir.path().join("clip.partial.mp4")));
        assert!(rules.should_ignore(&temp_dir.path().join("draft_cat.png")));
        assert!(!rules.should_ignore(&temp_dir.path().join("clip.mp4")));
    }

    #[test]
    fn test_ignore_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(IGNORE_FILE), "*.gif\n").unwrap();

        let rules = IgnoreRules::load(temp_dir.path(), &IgnoreConfig::default()).unwrap();
        assert!(rules.should_ignore(&temp_dir.path().join("anim.gif")));
        assert!(!rules.should_ignore(&temp_dir.path().join("still.png")));
    }

    #[test]
    fn test_ignore_file_disabled() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(IGNORE_FILE), "*.gif\n").unwrap();

        let config = IgnoreConfig {
            use_ignore_file: false,
            patterns: vec![],
        };
        let rules = IgnoreRules::load(temp_dir.path(), &config).unwrap();
        assert!(!rules.should_ignore(&temp_dir.path().join("anim.gif")));
    }
}
