//! End-to-end scheduler behaviour on paused tokio time.
//!
//! The injected clock follows the paused runtime clock from a fixed base, so
//! every test is deterministic: `tokio::time::sleep` fast-forwards through
//! scan ticks instead of waiting on the wall clock. The base sits mid-second
//! (xx.5) so scan instants never coincide exactly with cron slot boundaries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use tempo_cron::CronError;
use tempo_scheduler::{
    Clock, EventSink, Invocation, Scheduler, SchedulerConfig, SchedulerError, Submission,
    TaskFuture, TaskId, TokioWorkers, Workers,
};

fn config(check_interval_ms: u64) -> SchedulerConfig {
    SchedulerConfig { check_interval_ms, ..Default::default() }
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(500)
}

/// Follows tokio's (paused) clock from a fixed base instant.
struct TestClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TestClock {
    fn new(base: DateTime<Utc>) -> Self {
        Self { base, started: tokio::time::Instant::now() }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.started.elapsed()).expect("elapsed fits")
    }
}

#[derive(Default)]
struct RecordingSink {
    scans: AtomicUsize,
    dispatches: AtomicUsize,
    overlaps: AtomicUsize,
    rejections: AtomicUsize,
    failures: AtomicUsize,
}

impl EventSink for RecordingSink {
    fn on_scan(&self) {
        self.scans.fetch_add(1, Ordering::SeqCst);
    }
    fn on_dispatch(&self, _task_id: &TaskId, _name: &str) {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
    }
    fn on_overlap(&self, _task_id: &TaskId, _name: &str) {
        self.overlaps.fetch_add(1, Ordering::SeqCst);
    }
    fn on_rejected(&self, _task_id: &TaskId, _name: &str) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }
    fn on_failure(&self, _task_id: &TaskId, _name: &str, _error: &anyhow::Error) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

fn scheduler_with(
    check_interval_ms: u64,
    workers: Arc<dyn Workers>,
    sink: Option<Arc<RecordingSink>>,
) -> Arc<Scheduler> {
    let events = sink.map(|s| s as Arc<dyn EventSink>);
    Arc::new(
        Scheduler::with_capabilities(
            &config(check_interval_ms),
            workers,
            Arc::new(TestClock::new(base())),
            events,
        )
        .expect("scheduler construction failed"),
    )
}

fn noop_body() -> TaskFuture {
    Box::pin(async { Ok(()) })
}

#[tokio::test(start_paused = true)]
async fn every_second_task_runs_about_three_times_in_three_seconds() {
    let scheduler = scheduler_with(1_000, Arc::new(TokioWorkers::new(2)), None);
    let counter = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&counter);
    scheduler
        .register("ticker", "* * * * * *", move || {
            let c = Arc::clone(&c);
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .expect("register failed");

    let loop_handle = tokio::spawn(Arc::clone(&scheduler).run());
    tokio::time::sleep(Duration::from_millis(3_200)).await;

    let ran = counter.load(Ordering::SeqCst);
    assert!((3..=4).contains(&ran), "expected ~3 invocations in ~3s, got {ran}");

    scheduler.shutdown();
    assert!(scheduler.is_shutdown());
    scheduler.shutdown(); // idempotent

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(counter.load(Ordering::SeqCst), ran, "counter moved after shutdown");
    loop_handle.await.expect("scheduler loop panicked");
}

#[tokio::test(start_paused = true)]
async fn overlapping_slots_are_skipped_not_queued() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(1_000, Arc::new(TokioWorkers::new(2)), Some(Arc::clone(&sink)));

    let starts = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let s = Arc::clone(&starts);
    let r = Arc::clone(&release);
    scheduler
        .register("slow", "* * * * * *", move || {
            let s = Arc::clone(&s);
            let r = Arc::clone(&r);
            Box::pin(async move {
                s.fetch_add(1, Ordering::SeqCst);
                r.notified().await;
                Ok(())
            })
        })
        .expect("register failed");

    tokio::spawn(Arc::clone(&scheduler).run());
    tokio::time::sleep(Duration::from_millis(3_200)).await;

    // Dispatched exactly once; every later scan saw it still running and
    // pushed the slot forward instead of re-dispatching.
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(sink.overlaps.load(Ordering::SeqCst) >= 2);
    let tasks = scheduler.tasks();
    assert!(tasks[0].executing);

    // Let the stuck invocation finish; the task becomes schedulable again.
    release.notify_one();
    tokio::time::sleep(Duration::from_millis(2_200)).await;

    let started = starts.load(Ordering::SeqCst);
    assert!(started >= 2, "task never ran again after completing");
    // Never more invocations than whole periods elapsed (~5.4s of 1s slots),
    // and one body start per dispatch: no true->true transition ever.
    assert!(started <= 5, "overlap policy queued missed slots: {started} starts");
    assert_eq!(started, sink.dispatches.load(Ordering::SeqCst));

    scheduler.shutdown();
    release.notify_one();
}

struct RejectingPool;

impl Workers for RejectingPool {
    fn submit(&self, _invocation: Invocation) -> Submission {
        Submission::Rejected
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_submissions_keep_the_task_eligible() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(1_000, Arc::new(RejectingPool), Some(Arc::clone(&sink)));

    let counter = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&counter);
    scheduler
        .register("starved", "* * * * * *", move || {
            let c = Arc::clone(&c);
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .expect("register failed");

    tokio::spawn(Arc::clone(&scheduler).run());
    tokio::time::sleep(Duration::from_millis(3_200)).await;

    // Never ran, never marked executing, still due immediately. The loop
    // kept scanning and reported the rejection every pass.
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(sink.rejections.load(Ordering::SeqCst) >= 3);
    let tasks = scheduler.tasks();
    assert!(!tasks[0].executing);
    assert!(tasks[0].last_executing_time.is_none());
    assert!(tasks[0].next_executing_time.is_none());

    scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_bodies_do_not_stop_the_loop() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(1_000, Arc::new(TokioWorkers::new(4)), Some(Arc::clone(&sink)));

    let failing_runs = Arc::new(AtomicUsize::new(0));
    let panicking_runs = Arc::new(AtomicUsize::new(0));

    let f = Arc::clone(&failing_runs);
    scheduler
        .register("failing", "* * * * * *", move || {
            let f = Arc::clone(&f);
            Box::pin(async move {
                f.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("boom"))
            })
        })
        .expect("register failed");

    let p = Arc::clone(&panicking_runs);
    scheduler
        .register("panicking", "* * * * * *", move || {
            let p = Arc::clone(&p);
            Box::pin(async move {
                p.fetch_add(1, Ordering::SeqCst);
                panic!("kaboom");
            })
        })
        .expect("register failed");

    tokio::spawn(Arc::clone(&scheduler).run());
    tokio::time::sleep(Duration::from_millis(3_200)).await;

    // Both bodies kept being rescheduled: the completion transition ran
    // after every failure and the loop itself survived.
    assert!(failing_runs.load(Ordering::SeqCst) >= 3);
    assert!(panicking_runs.load(Ordering::SeqCst) >= 3);
    assert!(sink.failures.load(Ordering::SeqCst) >= 6);
    assert!(sink.scans.load(Ordering::SeqCst) >= 3);

    scheduler.shutdown();
}

#[test]
fn registration_rejects_malformed_and_unreachable_expressions() {
    let scheduler =
        Scheduler::new(&config(1_000), Arc::new(TokioWorkers::new(1))).expect("construction");

    let err = scheduler.register("bad", "not a cron", noop_body).unwrap_err();
    assert!(matches!(err, SchedulerError::Expression(CronError::Parse(_))));

    let err = scheduler.register("feb30", "0 0 0 30 2 *", noop_body).unwrap_err();
    assert!(matches!(err, SchedulerError::Expression(CronError::NoMatch(_))));

    // No partial task was created either way.
    assert!(scheduler.tasks().is_empty());
}

#[test]
fn shut_down_scheduler_refuses_registration() {
    let scheduler =
        Scheduler::new(&config(1_000), Arc::new(TokioWorkers::new(1))).expect("construction");
    scheduler.shutdown();
    let err = scheduler.register("late", "* * * * * *", noop_body).unwrap_err();
    assert!(matches!(err, SchedulerError::ShutDown));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let bad_interval = SchedulerConfig { check_interval_ms: 0, ..Default::default() };
    assert!(matches!(
        Scheduler::new(&bad_interval, Arc::new(TokioWorkers::new(1))),
        Err(SchedulerError::Config(_))
    ));

    let bad_tz = SchedulerConfig { timezone: "Nowhere/Void".into(), ..Default::default() };
    assert!(matches!(
        Scheduler::new(&bad_tz, Arc::new(TokioWorkers::new(1))),
        Err(SchedulerError::Config(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn two_registrations_of_the_same_body_run_independently() {
    let scheduler = scheduler_with(1_000, Arc::new(TokioWorkers::new(4)), None);
    let counter = Arc::new(AtomicUsize::new(0));

    for name in ["first", "second"] {
        let c = Arc::clone(&counter);
        scheduler
            .register(name, "* * * * * *", move || {
                let c = Arc::clone(&c);
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .expect("register failed");
    }
    assert_eq!(scheduler.tasks().len(), 2);

    tokio::spawn(Arc::clone(&scheduler).run());
    tokio::time::sleep(Duration::from_millis(2_200)).await;

    // Both tasks fire on every slot: twice the single-task count.
    let ran = counter.load(Ordering::SeqCst);
    assert!((4..=6).contains(&ran), "expected both tasks to run per slot, got {ran}");

    scheduler.shutdown();
}
