//! Owned worker pool for best-effort background work.
//!
//! The pool is constructed explicitly and handed to its users; there is no
//! process-wide executor. Concurrency is bounded by a semaphore and every task
//! is tracked so that [`WorkerPool::shutdown`] can wait for in-flight work.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Bounded pool of background workers.
pub struct WorkerPool {
    max_workers: usize,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    completed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Create a pool running at most `max_workers` tasks at once.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            tracker: TaskTracker::new(),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of idle worker slots.
    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tasks that have run to completion.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Queue `task` for execution. Returns false once the pool is shut down.
    pub fn submit<F>(&self, name: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!("Worker pool is shut down, dropping task '{}'", name);
            return false;
        }

        let semaphore = self.semaphore.clone();
        let completed = self.completed.clone();
        let name = name.to_string();
        self.tracker.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            debug!("Worker running task '{}'", name);
            task.await;
            completed.fetch_add(1, Ordering::SeqCst);
        });
        true
    }

    /// Stop accepting work and wait for every queued task to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!("Waiting for {} background tasks", pending);
        }
        self.tracker.wait().await;
        info!("Worker pool stopped");
    }
}
