use chrono::{DateTime, Utc};

/// Source of the current instant.
///
/// The scheduler never calls `Utc::now()` directly; everything flows through
/// this capability so tests can drive scans with a controlled clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
