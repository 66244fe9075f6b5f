//! Settle/evict execution
//!
//! Jobs are spawned as soon as they arrive so a slow video never delays
//! evictions or unrelated assets. Derivations are bounded by a semaphore;
//! evictions are cheap and skip it. A settle for a path that is already being
//! derived does not start a second derivation: the running worker does one
//! more pass when it finishes.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thumbgen_core::{Engine, Outcome};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

/// Unit of work produced by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Derive artifacts from the path's current content
    Settle(PathBuf),
    /// Remove every artifact of the path's source key
    Evict(PathBuf),
}

/// What the pool runs for each job
#[async_trait]
pub trait SettleHandler: Send + Sync + 'static {
    async fn settle(&self, path: &Path);
    async fn evict(&self, path: &Path);
}

#[async_trait]
impl SettleHandler for Engine {
    async fn settle(&self, path: &Path) {
        match self.process(path).await {
            Ok(Outcome::Derived(report)) if report.is_complete() => {
                info!(key = %report.key, artifacts = report.written.len(), "derived thumbnails");
            }
            Ok(Outcome::Derived(report)) => {
                warn!(
                    key = %report.key,
                    written = report.written.len(),
                    failed = report.failed.len(),
                    "thumbnails partially derived"
                );
            }
            Ok(Outcome::Vanished(report)) => {
                info!(path = %path.display(), evicted = report.removed.len(), "source gone, thumbnails evicted");
            }
            Ok(Outcome::Ignored) => trace!(path = %path.display(), "not an asset"),
            Err(e) => warn!(path = %path.display(), error = %e, "derivation aborted"),
        }
    }

    async fn evict(&self, path: &Path) {
        let Some(report) = Engine::evict(self, path).await else {
            return;
        };
        for (artifact, e) in &report.failed {
            warn!(path = %artifact.display(), error = %e, "failed to evict artifact");
        }
        info!(path = %path.display(), evicted = report.removed.len(), "thumbnails evicted");
    }
}

pub struct WorkerPool<H> {
    handler: Arc<H>,
    limit: Arc<Semaphore>,
    /// Paths being derived -> rerun requested
    in_flight: Arc<DashMap<PathBuf, bool>>,
}

impl<H: SettleHandler> WorkerPool<H> {
    /// Pool running at most `workers` derivations at once
    pub fn new(handler: Arc<H>, workers: usize) -> Self {
        Self {
            handler,
            limit: Arc::new(Semaphore::new(workers.max(1))),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn spawn(self, jobs: mpsc::UnboundedReceiver<Job>) -> JoinHandle<()> {
        tokio::spawn(self.run(jobs))
    }

    /// Consume jobs until every sender is gone, then wait for in-flight work
    pub async fn run(self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                job = jobs.recv() => match job {
                    Some(job) => self.dispatch(job, &mut tasks),
                    None => break,
                },
                Some(res) = tasks.join_next(), if !tasks.is_empty() => log_join(res),
            }
        }

        debug!(in_flight = tasks.len(), "job queue closed, draining workers");
        while let Some(res) = tasks.join_next().await {
            log_join(res);
        }
    }

    fn dispatch(&self, job: Job, tasks: &mut JoinSet<()>) {
        match job {
            Job::Evict(path) => {
                let handler = Arc::clone(&self.handler);
                tasks.spawn(async move { handler.evict(&path).await });
            }
            Job::Settle(path) => {
                match self.in_flight.entry(path.clone()) {
                    Entry::Occupied(mut rerun) => {
                        trace!(path = %path.display(), "derivation in flight, queueing rerun");
                        *rerun.get_mut() = true;
                        return;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(false);
                    }
                }

                let handler = Arc::clone(&self.handler);
                let limit = Arc::clone(&self.limit);
                let in_flight = Arc::clone(&self.in_flight);

                tasks.spawn(async move {
                    let mut guard = InFlightGuard {
                        in_flight,
                        path,
                        released: false,
                    };
                    loop {
                        {
                            // The semaphore is never closed
                            let _permit = limit.acquire().await.ok();
                            handler.settle(&guard.path).await;
                        }

                        if guard.in_flight.remove_if(&guard.path, |_, rerun| !*rerun).is_some() {
                            guard.released = true;
                            break;
                        }
                        if let Some(mut rerun) = guard.in_flight.get_mut(&guard.path) {
                            *rerun = false;
                        }
                    }
                });
            }
        }
    }
}

/// Frees a path's in-flight slot when its worker panics or is cancelled
struct InFlightGuard {
    in_flight: Arc<DashMap<PathBuf, bool>>,
    path: PathBuf,
    released: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            self.in_flight.remove(&self.path);
        }
    }
}

fn log_join(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!(error = %e, "worker task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records calls; settles take `work` to complete
    #[derive(Default)]
    struct Recorder {
        work: Duration,
        settled: Mutex<Vec<PathBuf>>,
        evicted: Mutex<Vec<PathBuf>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SettleHandler for Recorder {
        async fn settle(&self, path: &Path) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.settled.lock().push(path.to_path_buf());
            self.running.fetch_sub(1, Ordering::SeqCst);
        }

        async fn evict(&self, path: &Path) {
            self.evicted.lock().push(path.to_path_buf());
        }
    }

    /// Panics on its first settle, then records like [`Recorder`]
    #[derive(Default)]
    struct PanicsOnce {
        panicked: std::sync::atomic::AtomicBool,
        settled: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl SettleHandler for PanicsOnce {
        async fn settle(&self, path: &Path) {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("decoder blew up");
            }
            self.settled.lock().push(path.to_path_buf());
        }

        async fn evict(&self, _path: &Path) {}
    }

    fn recorder(work_ms: u64) -> Arc<Recorder> {
        Arc::new(Recorder {
            work: Duration::from_millis(work_ms),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let handler = recorder(100);
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(Arc::clone(&handler), 2).spawn(rx);

        for i in 0..6 {
            tx.send(Job::Settle(PathBuf::from(format!("/u/{}.png", i)))).unwrap();
        }
        drop(tx);
        pool.await.unwrap();

        assert_eq!(handler.settled.lock().len(), 6);
        assert_eq!(handler.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_path_never_derived_concurrently() {
        let handler = recorder(100);
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(Arc::clone(&handler), 8).spawn(rx);

        // Three settles while the first is still running collapse into one rerun
        tx.send(Job::Settle(PathBuf::from("/u/clip.mp4"))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        for _ in 0..3 {
            tx.send(Job::Settle(PathBuf::from("/u/clip.mp4"))).unwrap();
        }
        drop(tx);
        pool.await.unwrap();

        assert_eq!(handler.settled.lock().len(), 2);
        assert_eq!(handler.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evictions_do_not_wait_for_derivations() {
        let handler = recorder(10_000);
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(Arc::clone(&handler), 1).spawn(rx);

        tx.send(Job::Settle(PathBuf::from("/u/slow.mp4"))).unwrap();
        tx.send(Job::Evict(PathBuf::from("/u/gone.png"))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*handler.evicted.lock(), vec![PathBuf::from("/u/gone.png")]);
        assert!(handler.settled.lock().is_empty());

        drop(tx);
        pool.await.unwrap();
        assert_eq!(handler.settled.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_settle_does_not_wedge_path() {
        let handler = Arc::new(PanicsOnce::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(Arc::clone(&handler), 1).spawn(rx);

        tx.send(Job::Settle(PathBuf::from("/u/cat.png"))).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handler.panicked.load(Ordering::SeqCst));

        tx.send(Job::Settle(PathBuf::from("/u/cat.png"))).unwrap();
        drop(tx);
        pool.await.unwrap();

        assert_eq!(*handler.settled.lock(), vec![PathBuf::from("/u/cat.png")]);
    }
}
