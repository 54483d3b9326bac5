// tests/dispatch_timing.rs

//! Poll-by-poll dispatch behaviour for a single recurring task, plus the
//! one-time startup jitter on a group's first dispatch.

mod common;
use crate::common::init_tracing;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::TimeDelta;

use persched::sched::{Scheduler, TaskSpec};

/// Scaled version of the reference scenario: interval 400ms, worker holds the
/// group for 300ms.
///
/// - poll before the interval elapses: no dispatch
/// - poll after: dispatch, group busy
/// - poll while the worker runs: due by time but skipped
/// - poll after completion but before the interval has elapsed again: no
///   dispatch (completion stamping)
/// - poll once the interval has elapsed since completion: dispatch again
#[tokio::test]
async fn single_task_follows_the_poll_state_machine() {
    init_tracing();

    let runs = Arc::new(AtomicUsize::new(0));
    let runs_c = Arc::clone(&runs);

    let mut sched = Scheduler::new();
    sched
        .register(
            TaskSpec::new("ping", TimeDelta::milliseconds(400), move |_args: &[String]| {
                runs_c.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(300));
            })
            .group("g1"),
        )
        .unwrap();

    // t ~ 200ms: not yet due.
    tokio::time::sleep(Duration::from_millis(200)).await;
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0, "dispatched before due");

    // t ~ 500ms: due; dispatches and the group becomes busy.
    tokio::time::sleep(Duration::from_millis(250)).await;
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1, "first dispatch missing");

    // t ~ 650ms: worker still holds the group; due by time but skipped.
    tokio::time::sleep(Duration::from_millis(50)).await;
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1, "dispatched into a busy group");

    // t ~ 1000ms: worker completed ~900ms; only ~100ms have elapsed since
    // completion, so the 400ms interval blocks a new dispatch.
    tokio::time::sleep(Duration::from_millis(300)).await;
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1, "interval ignored after completion");

    // t ~ 1400ms: interval elapsed since completion; dispatches again.
    tokio::time::sleep(Duration::from_millis(350)).await;
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2, "second dispatch missing");
}

#[tokio::test]
async fn jitter_applies_only_to_the_groups_first_dispatch() {
    init_tracing();

    let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let starts_c = Arc::clone(&starts);

    let mut sched = Scheduler::new();
    sched
        .register(
            TaskSpec::new("jittered", TimeDelta::milliseconds(50), move |_args: &[String]| {
                starts_c.lock().unwrap().push(Instant::now());
            })
            .jitter_max(TimeDelta::milliseconds(500)),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let first_poll = Instant::now();
    sched.run_pending();

    // The first dispatch may be delayed by up to 500ms of jitter.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let first_start = {
        let guard = starts.lock().unwrap();
        assert_eq!(guard.len(), 1, "first dispatch did not run");
        guard[0]
    };
    let first_delay = first_start.duration_since(first_poll);
    assert!(
        first_delay <= Duration::from_millis(650),
        "first dispatch delayed beyond jitter_max: {first_delay:?}"
    );

    // Subsequent dispatches carry no jitter: the callable fires promptly
    // after its poll.
    let second_poll = Instant::now();
    sched.run_pending();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let guard = starts.lock().unwrap();
    assert_eq!(guard.len(), 2, "second dispatch did not run");
    let second_delay = guard[1].duration_since(second_poll);
    assert!(
        second_delay <= Duration::from_millis(120),
        "second dispatch appears jittered: {second_delay:?}"
    );
}
