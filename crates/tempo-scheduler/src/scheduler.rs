use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use tempo_cron::CronExpression;

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::events::EventSink;
use crate::task::{Task, TaskFuture, TaskId, TaskSnapshot, TaskState};
use crate::workers::{Invocation, Submission, Workers};

/// Cron task scheduler: owns the in-memory task registry and drives the
/// periodic scan loop.
///
/// Construct one, register tasks, then spawn [`Scheduler::run`] on the
/// runtime. Each scan dispatches due tasks to the worker capability; a task
/// whose previous invocation is still running has its slot pushed forward
/// rather than queued, so a task body is never re-entered.
///
/// [`Scheduler::shutdown`] is idempotent: it stops future scans and closes
/// the pool to new work. In-flight invocations are left to finish: there is
/// no cancellation and no per-invocation timeout, so a body that never
/// returns keeps its task marked executing and its slots are skipped
/// forever.
pub struct Scheduler {
    tasks: Mutex<Vec<Arc<Task>>>,
    workers: Arc<dyn Workers>,
    events: Option<Arc<dyn EventSink>>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    initial_delay: Duration,
    check_interval: Duration,
    active: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Create a scheduler with the system clock and no event sink.
    pub fn new(config: &SchedulerConfig, workers: Arc<dyn Workers>) -> Result<Self> {
        Self::with_capabilities(config, workers, Arc::new(SystemClock), None)
    }

    /// Full constructor: inject the clock and event-sink capabilities.
    pub fn with_capabilities(
        config: &SchedulerConfig,
        workers: Arc<dyn Workers>,
        clock: Arc<dyn Clock>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            tasks: Mutex::new(Vec::new()),
            workers,
            events,
            clock,
            tz: config.tz()?,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            check_interval: Duration::from_millis(config.check_interval_ms),
            active: AtomicBool::new(true),
            shutdown_tx,
        })
    }

    /// Register a unit of work under a cron schedule.
    ///
    /// The expression is parsed here and probed once, so malformed text and
    /// schedules that can never fire fail at the call site instead of inside
    /// the loop. The new task starts due immediately: the first scan
    /// dispatches it, and its completion computes the first real slot.
    ///
    /// There is no duplicate detection; registering the same closure twice
    /// creates two independent tasks.
    pub fn register<F>(&self, name: &str, cron: &str, body: F) -> Result<TaskId>
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        if !self.active.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }
        let expression = CronExpression::parse(cron, self.tz)?;
        expression.next_after(self.clock.now())?;

        let task = Arc::new(Task {
            id: TaskId::new(),
            name: name.to_string(),
            expression,
            invocable: Arc::new(body),
            state: Mutex::new(TaskState::default()),
        });
        let id = task.id.clone();
        self.tasks.lock().expect("task registry poisoned").push(task);
        info!(task_id = %id, name, cron, "task registered");
        Ok(id)
    }

    /// Snapshot of every registered task's scheduling state, in
    /// registration order.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.lock().expect("task registry poisoned");
        tasks
            .iter()
            .map(|task| {
                let state = task.state.lock().expect("task state poisoned");
                TaskSnapshot {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    last_executing_time: state.last_executing_time,
                    next_executing_time: state.next_executing_time,
                    executing: state.executing,
                }
            })
            .collect()
    }

    pub fn is_shutdown(&self) -> bool {
        !self.active.load(Ordering::SeqCst)
    }

    /// Stop scanning and close the worker pool to new submissions.
    /// Idempotent. In-flight invocations are not interrupted.
    pub fn shutdown(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("scheduler shutting down");
            self.workers.close();
            let _ = self.shutdown_tx.send(true);
        }
    }

    /// Scan loop. Ticks every check interval (after the initial delay) until
    /// [`shutdown`](Self::shutdown) is called. Spawn this on the runtime;
    /// scans are serialized by construction because this is the only driver.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        // A shutdown that happened before this subscription never fires the
        // channel; anything later does.
        if self.is_shutdown() {
            return;
        }
        info!(
            check_interval_ms = self.check_interval.as_millis() as u64,
            tz = %self.tz,
            "scheduler started"
        );
        let first_tick = tokio::time::Instant::now() + self.initial_delay;
        let mut interval = tokio::time::interval_at(first_tick, self.check_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.scan(),
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler loop stopped");
                        break;
                    }
                }
            }
        }
    }

    // --- scan pass ---------------------------------------------------------

    /// One pass over the registry: dispatch due idle tasks, push the slot
    /// forward for due tasks that are still running. Everything a task can do
    /// wrong is contained at the invocation boundary; nothing here may take
    /// the loop down.
    fn scan(&self) {
        if let Some(sink) = &self.events {
            sink.on_scan();
        }
        let now = self.clock.now();
        let tasks = self.tasks.lock().expect("task registry poisoned");
        for task in tasks.iter() {
            let mut state = task.state.lock().expect("task state poisoned");
            let due = state.next_executing_time.is_none_or(|next| next < now);
            if !due {
                continue;
            }
            if state.executing {
                // Overlap: the previous invocation is still running. Skip the
                // missed slot forward instead of queueing it.
                advance_next(task, &mut state, now);
                warn!(task_id = %task.id, name = %task.name, "task still running, slot skipped");
                if let Some(sink) = &self.events {
                    sink.on_overlap(&task.id, &task.name);
                }
                continue;
            }
            match self.workers.submit(self.invocation(Arc::clone(task))) {
                Submission::Accepted => {
                    // Both writes land before this task's state lock is
                    // released, so the completion callback (which takes the
                    // same lock) can never observe a half-dispatched task.
                    state.last_executing_time = Some(now);
                    state.executing = true;
                    debug!(task_id = %task.id, name = %task.name, "task dispatched");
                    if let Some(sink) = &self.events {
                        sink.on_dispatch(&task.id, &task.name);
                    }
                }
                Submission::Rejected => {
                    // Stays due; retried on the next scan.
                    warn!(task_id = %task.id, name = %task.name, "worker pool rejected task");
                    if let Some(sink) = &self.events {
                        sink.on_rejected(&task.id, &task.name);
                    }
                }
            }
        }
    }

    /// Wrap one task body into a pool-ready invocation: run the body in its
    /// own tokio task so a panic surfaces as a `JoinError` instead of killing
    /// the worker, report failures, then perform the completion transition.
    fn invocation(&self, task: Arc<Task>) -> Invocation {
        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        Box::pin(async move {
            let body = (task.invocable)();
            let outcome = match tokio::spawn(body).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(join_error) => Err(anyhow::anyhow!("task body panicked: {join_error}")),
            };
            if let Err(e) = &outcome {
                error!(task_id = %task.id, name = %task.name, "task failed: {e:#}");
                if let Some(sink) = &events {
                    sink.on_failure(&task.id, &task.name, e);
                }
            }
            // The next slot is computed from the completion time, not the
            // originally due time: a slow run pushes its successor forward.
            let now = clock.now();
            let mut state = task.state.lock().expect("task state poisoned");
            state.executing = false;
            advance_next(&task, &mut state, now);
        })
    }
}

/// Advance `next_executing_time` strictly past `now`. An expression that has
/// run out of matching instants retires the task to the far future: the
/// registry keeps the entry, but it will never come due again.
fn advance_next(task: &Task, state: &mut TaskState, now: DateTime<Utc>) {
    match task.expression.next_after(now) {
        Ok(next) => state.next_executing_time = Some(next),
        Err(e) => {
            error!(task_id = %task.id, name = %task.name, "next run computation failed: {e}");
            state.next_executing_time = Some(DateTime::<Utc>::MAX_UTC);
        }
    }
}
