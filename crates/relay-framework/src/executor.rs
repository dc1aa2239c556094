//! Execution bridge between the router and the two handler kinds.
//!
//! Cooperative handlers are awaited in place by the router, with panics
//! converted into [`HandlerFailure`]s. Blocking handlers are handed to a
//! [`WorkerPool`] and forgotten; the pool reports their failures.
//!
//! [`ThreadPool`] is the default pool. It runs jobs with
//! `tokio::task::spawn_blocking`, at most `num_workers` at a time.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use relay_core::{BlockingJob, WorkerPool};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use crate::error::HandlerFailure;
use crate::handler::HandlerDescriptor;

// =============================================================================
// Bridge
// =============================================================================

/// Hands a blocking job to `pool` without waiting for it.
pub fn submit_blocking(pool: &dyn WorkerPool, job: BlockingJob) {
    trace!("Submitting blocking job");
    pool.submit(job);
}

/// Awaits a cooperative handler, turning a panic into a [`HandlerFailure`].
pub async fn await_cooperative(
    descriptor: &HandlerDescriptor,
    fut: BoxFuture<'static, Result<(), HandlerFailure>>,
) -> Result<(), HandlerFailure> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerFailure::Panicked {
            plugin: descriptor.owner().name().to_owned(),
            listener: descriptor.name().to_owned(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// =============================================================================
// ThreadPool
// =============================================================================

/// Default [`WorkerPool`] backed by Tokio's blocking thread pool.
///
/// Jobs must be submitted from within a Tokio runtime. At most `num_workers`
/// jobs run at once; the rest wait for a permit without blocking the caller.
pub struct ThreadPool {
    num_workers: usize,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    closed: AtomicBool,
}

impl ThreadPool {
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        Self {
            num_workers,
            permits: Arc::new(Semaphore::new(num_workers)),
            tracker: TaskTracker::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Closes the pool and waits for every submitted job to finish.
    pub async fn drain(&self) {
        self.close();
        self.tracker.wait().await;
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(10)
    }
}

impl WorkerPool for ThreadPool {
    fn submit(&self, job: BlockingJob) {
        if self.is_closed() {
            warn!("Worker pool is closed, dropping blocking job");
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            error!("Blocking job submitted outside of a Tokio runtime, dropping it");
            return;
        };

        let permits = Arc::clone(&self.permits);
        self.tracker.spawn_on(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                match tokio::task::spawn_blocking(job).await {
                    Ok(follow_up) => {
                        if let Err(e) = follow_up.await {
                            error!(error = %e, "Blocking handler failed");
                        }
                    }
                    Err(e) if e.is_panic() => {
                        let message = panic_message(e.into_panic().as_ref());
                        error!(panic = %message, "Blocking handler panicked");
                    }
                    Err(e) => warn!(error = %e, "Blocking handler was cancelled"),
                }
            },
            &handle,
        );
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.tracker.close();
            debug!(pending = self.tracker.len(), "Worker pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use relay_core::{BoxError, HandlerResult};

    use super::*;

    fn counting_job(counter: Arc<AtomicUsize>) -> BlockingJob {
        Box::new(move || -> BoxFuture<'static, HandlerResult> {
            std::thread::sleep(Duration::from_millis(5));
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_run_to_completion() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            submit_blocking(&pool, counting_job(counter.clone()));
        }
        pool.drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_jobs_are_contained() {
        let pool = ThreadPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::new(|| -> BoxFuture<'static, HandlerResult> {
            Box::pin(async { Err::<(), BoxError>("boom".into()) })
        }));
        pool.submit(Box::new(|| -> BoxFuture<'static, HandlerResult> {
            panic!("job panicked")
        }));
        pool.submit(counting_job(counter.clone()));
        pool.drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_drops_jobs() {
        let pool = ThreadPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.close();
        assert!(pool.is_closed());
        pool.submit(counting_job(counter.clone()));
        pool.drain().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submit_outside_runtime_is_dropped() {
        let pool = ThreadPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(counting_job(counter.clone()));
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
