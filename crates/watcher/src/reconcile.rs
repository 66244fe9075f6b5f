//! Orphan reconciliation
//!
//! Restores the invariant that every artifact belongs to an existing source
//! after events were missed (startup, watcher overflow, downtime). A pass
//! lists the root, scans the profile areas, and deletes an artifact only when
//! its source key is missing from that snapshot and from a second listing
//! taken after the scan. Passes never overlap.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thumbgen_core::{ThumbError, ThumbStore, ARTIFACT_EXT};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one reconciliation pass saw and did
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Source keys present in the root when the pass started
    pub valid_keys: usize,
    /// Artifact entries examined
    pub scanned: usize,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
    /// Directories that could not be listed
    pub skipped_dirs: Vec<PathBuf>,
    pub bytes_freed: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped_dirs.is_empty()
    }
}

pub struct Reconciler {
    store: ThumbStore,
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: ThumbStore) -> Self {
        Self {
            store,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one pass (blocking)
    ///
    /// Per-entry failures are logged and reported; the pass keeps going.
    pub fn run(&self) -> ReconcileReport {
        let _pass = self.pass_lock.lock();

        // Without a complete snapshot every artifact would look orphaned
        match self.store.valid_keys() {
            Ok(valid) => self.sweep(&valid),
            Err(e) => self.unreadable_root(e),
        }
    }

    /// Delete artifacts whose key is in neither `valid` nor a fresh listing
    ///
    /// An upload that settles while the profile areas are being scanned has
    /// a source that predates its artifact, so the second listing sees it.
    fn sweep(&self, valid: &HashSet<String>) -> ReconcileReport {
        let mut report = ReconcileReport {
            valid_keys: valid.len(),
            ..Default::default()
        };

        let mut candidates = Vec::new();
        for profile in self.store.profiles() {
            let dir = self.store.profile_dir(profile);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot list profile area");
                    report.skipped_dirs.push(dir);
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "failed to read directory entry");
                        continue;
                    }
                };
                if let Some(orphan) = check_entry(&entry, valid, &mut report) {
                    candidates.push(orphan);
                }
            }
        }

        if candidates.is_empty() {
            return report;
        }

        let current = match self.store.valid_keys() {
            Ok(keys) => keys,
            Err(e) => {
                let mut skipped = self.unreadable_root(e);
                skipped.valid_keys = report.valid_keys;
                skipped.scanned = report.scanned;
                skipped.skipped_dirs.append(&mut report.skipped_dirs);
                return skipped;
            }
        };

        for orphan in candidates {
            if current.contains(&orphan.key) {
                debug!(key = %orphan.key, "source appeared during reconciliation, keeping artifact");
                continue;
            }
            remove_orphan(orphan, &mut report);
        }

        report
    }

    fn unreadable_root(&self, e: ThumbError) -> ReconcileReport {
        warn!(root = %self.store.root().display(), error = %e, "cannot list root, skipping reconciliation");
        ReconcileReport {
            skipped_dirs: vec![self.store.root().to_path_buf()],
            ..Default::default()
        }
    }

    /// Run one pass on the blocking pool
    pub async fn run_async(self: &Arc<Self>) -> ReconcileReport {
        let this = Arc::clone(self);
        match tokio::task::spawn_blocking(move || this.run()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "reconciliation task failed");
                ReconcileReport::default()
            }
        }
    }
}

/// Artifact whose key had no source when the profile area was scanned
struct Orphan {
    path: PathBuf,
    key: String,
    size: u64,
}

fn check_entry(entry: &fs::DirEntry, valid: &HashSet<String>, report: &mut ReconcileReport) -> Option<Orphan> {
    let name = entry.file_name();
    let name = name.to_str()?;
    // In-progress temp files and anything else hidden
    if name.starts_with('.') {
        return None;
    }
    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
        return None;
    }

    report.scanned += 1;

    let key = name
        .strip_suffix(ARTIFACT_EXT)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(name);
    if valid.contains(key) {
        return None;
    }

    Some(Orphan {
        path: entry.path(),
        key: key.to_string(),
        size: entry.metadata().map(|m| m.len()).unwrap_or(0),
    })
}

fn remove_orphan(orphan: Orphan, report: &mut ReconcileReport) {
    match fs::remove_file(&orphan.path) {
        Ok(()) => {
            info!(path = %orphan.path.display(), key = %orphan.key, "removed orphaned artifact");
            report.bytes_freed += orphan.size;
            report.removed.push(orphan.path);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %orphan.path.display(), error = %e, "failed to remove orphaned artifact");
            report.failed.push((orphan.path, e));
        }
    }
}

/// Periodic reconciliation loop
///
/// Covers events the watcher dropped while running.
pub struct PeriodicReconciler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl PeriodicReconciler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self { reconciler, interval }
    }

    /// Run until the task is aborted
    pub async fn run(self) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Starting periodic reconciliation (interval: {:?})", self.interval);

        // The first tick completes immediately; startup already reconciled
        timer.tick().await;

        loop {
            timer.tick().await;

            let report = self.reconciler.run_async().await;
            if report.removed.is_empty() {
                debug!(scanned = report.scanned, "periodic reconciliation: no orphans");
            } else {
                info!(
                    removed = report.removed.len(),
                    bytes_freed = report.bytes_freed,
                    "periodic reconciliation removed orphans"
                );
            }
        }
    }
}
