//! File system watching for thumbgen
//!
//! This crate provides:
//! - A notify-backed watcher over the flat asset root
//! - Per-path debouncing (default 500ms)
//! - Event routing (settle vs. eviction, profile sub-areas filtered out)
//! - A bounded worker pool with per-path coalescing
//! - Orphan reconciliation, on demand and periodic

pub mod debounce;
pub mod reconcile;
pub mod router;
pub mod worker;

pub use debounce::Debouncer;
pub use reconcile::{PeriodicReconciler, ReconcileReport, Reconciler};
pub use router::EventRouter;
pub use worker::{Job, SettleHandler, WorkerPool};

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{EventKind as NotifyKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// File system watcher over a single, non-recursive directory
pub struct Watcher {
    root: PathBuf,
    inner: Option<RecommendedWatcher>,
}

impl Watcher {
    /// Create a new watcher for the given directory
    pub fn new(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            anyhow::bail!("Cannot watch {}: not a directory", path.display());
        }
        Ok(Self {
            root: path.to_path_buf(),
            inner: None,
        })
    }

    /// Start watching; events arrive on the returned channel
    ///
    /// The channel closes when the watcher is stopped or dropped.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<WatchEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if event.need_rescan() {
                    warn!("watch events were dropped; run `thumbgen regenerate` to rebuild missing thumbnails and remove orphans");
                }
                for ev in translate(&event) {
                    // Receiver gone means we are shutting down
                    let _ = tx.send(ev);
                }
            }
            Err(e) => warn!(error = %e, "watcher error"),
        })
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;

        debug!(root = %self.root.display(), "watch established");
        self.inner = Some(watcher);
        Ok(rx)
    }

    /// Stop watching
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut watcher) = self.inner.take() {
            watcher
                .unwatch(&self.root)
                .with_context(|| format!("Failed to unwatch {}", self.root.display()))?;
        }
        Ok(())
    }
}

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created, or renamed into place
    Create,
    /// File contents written
    Modify,
    /// File deleted
    Delete,
    /// File renamed away from this path
    Rename,
}

/// Map a raw notify event onto zero or more [`WatchEvent`]s
///
/// Metadata-only changes and reads are dropped. A finished write
/// (close-after-write) counts as a modification.
pub fn translate(event: &notify::Event) -> Vec<WatchEvent> {
    let all = |kind: EventKind| {
        event
            .paths
            .iter()
            .map(|p| WatchEvent::new(p.clone(), kind))
            .collect::<Vec<_>>()
    };

    match &event.kind {
        NotifyKind::Create(_) => all(EventKind::Create),
        NotifyKind::Remove(_) => all(EventKind::Delete),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::From)) => all(EventKind::Rename),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::To)) => all(EventKind::Create),
        NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![
                WatchEvent::new(from.clone(), EventKind::Rename),
                WatchEvent::new(to.clone(), EventKind::Create),
            ],
            _ => vec![],
        },
        // Direction unknown: whatever still exists was renamed in
        NotifyKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    EventKind::Create
                } else {
                    EventKind::Rename
                };
                WatchEvent::new(p.clone(), kind)
            })
            .collect(),
        NotifyKind::Modify(ModifyKind::Metadata(_)) => vec![],
        NotifyKind::Modify(_) => all(EventKind::Modify),
        NotifyKind::Access(AccessKind::Close(AccessMode::Write)) => all(EventKind::Modify),
        _ => vec![],
    }
}
