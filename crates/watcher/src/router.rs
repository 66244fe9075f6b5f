//! Debounced event routing
//!
//! Consumes [`WatchEvent`]s and turns them into work:
//! - create/modify -> (re)start the path's debounce timer
//! - delete/rename-away -> cancel the timer and evict immediately
//!
//! Events inside profile sub-areas are the engine's own writes and are dropped.
//! The routing loop never waits on derivation work.

use crate::debounce::Debouncer;
use crate::worker::Job;
use crate::{EventKind, WatchEvent};
use std::time::Duration;
use thumbgen_core::ThumbStore;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

pub struct EventRouter {
    store: ThumbStore,
    debouncer: Debouncer,
    jobs: mpsc::UnboundedSender<Job>,
}

impl EventRouter {
    pub fn new(store: ThumbStore, delay: Duration, jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(delay, jobs.clone()),
            jobs,
        }
    }

    /// Route events until the stream closes
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        info!(
            root = %self.store.root().display(),
            debounce_ms = self.debouncer.delay().as_millis() as u64,
            "routing filesystem events"
        );

        while let Some(event) = events.recv().await {
            self.route(event);
        }

        debug!(pending = self.debouncer.pending(), "event stream closed");
    }

    /// Route a single event
    pub fn route(&self, event: WatchEvent) {
        if self.store.is_in_profile_area(&event.path) {
            trace!(path = %event.path.display(), "ignoring artifact event");
            return;
        }

        let Some(asset) = self.store.classify(&event.path) else {
            trace!(path = %event.path.display(), "ignoring non-asset event");
            return;
        };

        match event.kind {
            EventKind::Create | EventKind::Modify => {
                trace!(key = %asset.key, kind = ?event.kind, "asset changed");
                self.debouncer.touch(event.path);
            }
            EventKind::Delete | EventKind::Rename => {
                let cancelled = self.debouncer.cancel(&event.path);
                info!(key = %asset.key, cancelled_settle = cancelled, "asset removed");
                let _ = self.jobs.send(Job::Evict(event.path));
            }
        }
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }
}
