//! Bounded CPU worker pool bridged into async code.
//!
//! Jobs run on a dedicated `rayon` pool so CPU-heavy strategies never block
//! the tokio scheduler. Results come back over a oneshot channel; a panic
//! inside a job is caught and returned as [`DetectError::Panicked`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{DetectError, Result};

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tenderscope-worker-{}", i))
            .build()
            .map_err(|e| DetectError::Pool(e.to_string()))?;
        debug!(workers, "worker pool started");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` on the pool and await its result.
    ///
    /// If the awaiting future is dropped (e.g. on timeout) the job still runs
    /// to completion; its result is discarded.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                .unwrap_or_else(|payload| Err(DetectError::Panicked(panic_message(payload.as_ref()))));
            // Receiver gone means the caller stopped waiting.
            let _ = tx.send(outcome);
        });
        rx.await.map_err(|_| DetectError::WorkerLost)?
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_job_result() {
        let pool = WorkerPool::new(2).unwrap();
        let v = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn panic_becomes_error() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool
            .run::<_, ()>(|| panic!("boom"))
            .await
            .unwrap_err();
        match err {
            DetectError::Panicked(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn job_errors_pass_through() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool
            .run::<_, ()>(|| Err(DetectError::StrategyFailed("bad column".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::StrategyFailed(_)));
    }

    #[test]
    fn zero_workers_is_clamped() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);
    }
}
