use crate::task::TaskId;

/// Observability callbacks emitted by the scan loop and worker completions.
///
/// The scheduler holds the sink as an optional capability
/// (`Option<Arc<dyn EventSink>>`): when none is configured the events are
/// simply not delivered, and scheduling behaviour is identical either way.
/// Every method defaults to a no-op so implementors override only what they
/// watch.
pub trait EventSink: Send + Sync {
    /// A scan pass is starting.
    fn on_scan(&self) {}

    /// A due task was handed to the worker pool.
    fn on_dispatch(&self, _task_id: &TaskId, _name: &str) {}

    /// A due task was still running from a previous dispatch; its slot was
    /// skipped forward instead of being queued.
    fn on_overlap(&self, _task_id: &TaskId, _name: &str) {}

    /// The worker pool refused a due task; it stays eligible and is retried
    /// on the next scan.
    fn on_rejected(&self, _task_id: &TaskId, _name: &str) {}

    /// A task body returned an error or panicked. The completion transition
    /// still runs: the task's next slot has been recomputed.
    fn on_failure(&self, _task_id: &TaskId, _name: &str, _error: &anyhow::Error) {}
}
