use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempo_cron::CronExpression;
use uuid::Uuid;

/// Unique identifier for a registered task (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Future returned by one invocation of a task body.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered unit of work: each call produces one invocation future.
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Mutable scheduling state of one task.
///
/// All three fields live behind a single mutex because two threads write
/// them: the scan task flips `executing` on and stamps
/// `last_executing_time` at dispatch, while the worker flips `executing`
/// off and advances `next_executing_time` at completion, and the overlap
/// check rewrites `next_executing_time` while an invocation may still be in
/// flight. One cell under one lock rules out lost updates.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskState {
    /// Instant the most recent invocation started. `None` = never ran.
    pub last_executing_time: Option<DateTime<Utc>>,
    /// Instant before which the task is not due. `None` = due immediately.
    pub next_executing_time: Option<DateTime<Utc>>,
    /// True while a worker has an outstanding invocation.
    pub executing: bool,
}

/// A registered task: identity, schedule, body and scheduling state.
pub(crate) struct Task {
    pub id: TaskId,
    pub name: String,
    pub expression: CronExpression,
    pub invocable: TaskFn,
    pub state: Mutex<TaskState>,
}

/// Read-only view of one task's scheduling state (see `Scheduler::tasks`).
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub last_executing_time: Option<DateTime<Utc>>,
    pub next_executing_time: Option<DateTime<Utc>>,
    pub executing: bool,
}
