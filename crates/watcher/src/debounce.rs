//! Per-path debouncing logic
//!
//! Uploads arrive as bursts of write events while the file is still being
//! transferred. Each path gets one timer; every new event resets it, and only
//! a timer that runs out undisturbed emits a [`Job::Settle`].

use crate::worker::Job;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

struct PendingTimer {
    generation: u64,
    timer: JoinHandle<()>,
}

/// Registry of pending per-path timers
pub struct Debouncer {
    delay: Duration,
    pending: Arc<DashMap<PathBuf, PendingTimer>>,
    next_generation: AtomicU64,
    jobs: mpsc::UnboundedSender<Job>,
}

impl Debouncer {
    pub fn new(delay: Duration, jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            delay,
            pending: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            jobs,
        }
    }

    /// Start or reset the timer for `path`
    ///
    /// Must be called from within a tokio runtime.
    pub fn touch(&self, path: PathBuf) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // The entry guard is held while spawning so a fast timer cannot look
        // for its entry before it exists
        match self.pending.entry(path.clone()) {
            Entry::Occupied(mut slot) => {
                slot.get().timer.abort();
                let timer = self.spawn_timer(path, generation);
                slot.insert(PendingTimer { generation, timer });
                trace!("debounce timer reset");
            }
            Entry::Vacant(slot) => {
                let timer = self.spawn_timer(path, generation);
                slot.insert(PendingTimer { generation, timer });
            }
        }
    }

    /// Cancel the pending timer for `path`; true if one was pending
    pub fn cancel(&self, path: &Path) -> bool {
        match self.pending.remove(path) {
            Some((_, pending)) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Number of paths waiting to settle
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn spawn_timer(&self, path: PathBuf, generation: u64) -> JoinHandle<()> {
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let jobs = self.jobs.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A newer touch replaced this timer's entry; let that one fire
            let current = pending
                .remove_if(&path, |_, p| p.generation == generation)
                .is_some();
            if current {
                let _ = jobs.send(Job::Settle(path));
            }
        })
    }
}
