//! Process modes
//!
//! Every mode starts from the same state: the layout is created and one
//! reconciliation pass removes artifacts whose source is gone. After that the
//! runner either re-derives everything once, or watches the root until asked
//! to stop.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use thumbgen_core::{Asset, Config, Engine, Outcome, RegenerateSummary};
use thumbgen_watcher::{EventRouter, PeriodicReconciler, ReconcileReport, Reconciler, Watcher, WorkerPool};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct Runner {
    config: Config,
    engine: Engine,
    reconciler: Arc<Reconciler>,
}

impl Runner {
    /// Create the root and profile sub-areas and wire up the engine
    ///
    /// Failing to create the layout is fatal.
    pub fn open(config: Config) -> Result<Self> {
        let engine = Engine::from_config(&config)
            .with_context(|| format!("Failed to prepare asset root {}", config.root.display()))?;
        let reconciler = Arc::new(Reconciler::new(engine.store().clone()));

        Ok(Self {
            config,
            engine,
            reconciler,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// One reconciliation pass
    pub async fn reconcile(&self) -> ReconcileReport {
        let report = self.reconciler.run_async().await;
        info!(
            valid_keys = report.valid_keys,
            scanned = report.scanned,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "reconciliation complete"
        );
        report
    }

    /// Number of assets currently in the root
    pub fn asset_count(&self) -> Result<usize> {
        Ok(self.engine.store().list_assets()?.len())
    }

    /// Reconcile, then re-derive every asset once
    ///
    /// No debounce delay applies; `on_done` sees each asset as it finishes.
    pub async fn regenerate<F>(&self, on_done: F) -> Result<(ReconcileReport, RegenerateSummary)>
    where
        F: FnMut(&Asset, &thumbgen_core::Result<Outcome>),
    {
        let reconciled = self.reconcile().await;
        let summary = self
            .engine
            .regenerate_all(self.config.watch.workers, on_done)
            .await
            .context("Failed to regenerate thumbnails")?;

        info!(
            total = summary.total,
            derived = summary.derived,
            partial = summary.partial,
            failed = summary.failed,
            "regeneration complete"
        );
        Ok((reconciled, summary))
    }

    /// Reconcile, then keep artifacts in sync until `shutdown` resolves
    ///
    /// The watch is established before the startup pass so nothing that
    /// happens during it is missed; buffered events are routed afterwards.
    /// On shutdown the watch is dropped, pending settles fire and in-flight
    /// derivations finish before this returns.
    pub async fn watch<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let root = self.engine.store().root().to_path_buf();

        let mut watcher = Watcher::new(&root)?;
        let events = watcher.start().context("Failed to establish watch")?;

        self.reconcile().await;

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(Arc::new(self.engine.clone()), self.config.watch.workers).spawn(jobs_rx);
        let router = tokio::spawn(
            EventRouter::new(self.engine.store().clone(), self.config.debounce(), jobs_tx).run(events),
        );

        let periodic = self.config.reconcile_interval().map(|interval| {
            tokio::spawn(PeriodicReconciler::new(Arc::clone(&self.reconciler), interval).run())
        });

        info!(
            root = %root.display(),
            workers = self.config.watch.workers,
            "watching for uploads"
        );

        shutdown.await;
        info!("shutting down");

        if let Some(task) = periodic {
            task.abort();
        }

        // Dropping the watcher closes the event stream, which ends the router,
        // which in turn lets the pool drain
        if let Err(e) = watcher.stop() {
            warn!(error = %e, "failed to stop watcher cleanly");
        }
        drop(watcher);

        if let Err(e) = router.await {
            warn!(error = %e, "event router failed");
        }
        if let Err(e) = pool.await {
            warn!(error = %e, "worker pool failed");
        }

        debug!("shutdown complete");
        Ok(())
    }
}
