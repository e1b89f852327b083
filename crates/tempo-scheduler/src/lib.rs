//! `tempo-scheduler` — periodic task execution driven by cron expressions.
//!
//! # Overview
//!
//! Tasks are registered in memory with a six-field cron expression
//! ([`tempo_cron::CronExpression`]) and an async body. A single scan loop
//! polls the registry every check interval and hands due tasks to a bounded
//! worker pool. A task whose previous invocation is still running when it
//! comes due again has that slot skipped forward: overlapping periods are
//! dropped, never queued, so no task body is ever re-entered.
//!
//! The loop consumes three injected capabilities:
//!
//! | Capability   | Trait                 | Provided impl                |
//! |--------------|-----------------------|------------------------------|
//! | workers      | [`workers::Workers`]  | [`workers::TokioWorkers`]    |
//! | clock        | [`clock::Clock`]      | [`clock::SystemClock`]       |
//! | event sink   | [`events::EventSink`] | optional, none by default    |
//!
//! Worker-pool rejection and task-body failures (including panics) are
//! contained, reported through the sink and `tracing`, and never stop the
//! loop. Nothing is persisted: a restart starts from an empty registry.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod task;
pub mod workers;

pub use clock::{Clock, SystemClock};
pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use events::EventSink;
pub use scheduler::Scheduler;
pub use task::{TaskFn, TaskFuture, TaskId, TaskSnapshot};
pub use workers::{Invocation, Submission, TokioWorkers, Workers};
