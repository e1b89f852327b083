use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// A ready-to-run invocation. Error reporting and completion bookkeeping are
/// folded in by the scheduler before submission, so the pool only needs to
/// drive it.
pub type Invocation = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Outcome of handing an invocation to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Rejected,
}

/// Worker-execution capability consumed by the scan loop.
///
/// `submit` must not block: a saturated or closed pool answers `Rejected`,
/// and the loop retries the task on a later scan.
pub trait Workers: Send + Sync {
    fn submit(&self, invocation: Invocation) -> Submission;

    /// Stop accepting new work. In-flight invocations keep running.
    fn close(&self) {}
}

/// Fixed-size pool running invocations as tokio tasks.
///
/// Concurrency is bounded by a semaphore whose permits are taken without
/// waiting, so saturation shows up as `Rejected` rather than queueing.
pub struct TokioWorkers {
    permits: Arc<Semaphore>,
}

impl TokioWorkers {
    pub fn new(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size)) }
    }
}

impl Workers for TokioWorkers {
    fn submit(&self, invocation: Invocation) -> Submission {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    let _permit = permit;
                    invocation.await;
                });
                Submission::Accepted
            }
            // Covers both "no free slot" and "closed for shutdown".
            Err(_) => Submission::Rejected,
        }
    }

    fn close(&self) {
        self.permits.close();
    }
}
