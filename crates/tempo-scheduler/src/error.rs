use tempo_cron::CronError;
use thiserror::Error;

/// Errors surfaced by the scheduling layer.
///
/// Runtime conditions (a saturated worker pool, a failing task body) are
/// reported through the event sink and `tracing` instead: they are recovered
/// inside the scan loop and must never escape it.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid configuration value (check interval, worker count, timezone).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cron expression supplied at registration is malformed or can
    /// never fire.
    #[error("Cron expression rejected: {0}")]
    Expression(#[from] CronError),

    /// The scheduler has been shut down; no further registrations are accepted.
    #[error("Scheduler is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
