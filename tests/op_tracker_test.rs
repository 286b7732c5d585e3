//! Admission control and op accounting under contention.

use loadgen_core::error::ErrorKind;
use loadgen_core::ops::{
    FailureCause, FailureKind, OpMetrics, OpOutcome, OpState, OpTracker, PendingOp,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok, block_on, task};

fn tracker(max: usize) -> OpTracker {
    OpTracker::new(max, Arc::new(OpMetrics::new("op-tracker-it").unwrap()))
}

#[test]
fn test_admission_blocks_at_limit_and_resumes_on_completion() {
    let tracker = tracker(1);
    let first = block_on(tracker.admit(PendingOp::new(0, 1))).unwrap();
    assert_eq!(first.state(), OpState::Started);

    let mut waiting = task::spawn(tracker.admit(PendingOp::new(1, 1)));
    assert_pending!(waiting.poll());
    assert_eq!(tracker.in_flight(), 1);

    tracker
        .complete(first, OpOutcome::Success(json!({ "ok": true })))
        .unwrap();
    assert!(waiting.is_woken());

    let second = assert_ready_ok!(waiting.poll());
    assert_eq!(second.cycle(), 1);
    assert_eq!(tracker.in_flight(), 1);
}

#[test]
fn test_close_wakes_blocked_admitters() {
    let tracker = tracker(1);
    let _held = block_on(tracker.admit(PendingOp::new(0, 1))).unwrap();

    let mut blocked = task::spawn(tracker.admit(PendingOp::new(1, 1)));
    assert_pending!(blocked.poll());

    tracker.close();
    assert!(blocked.is_woken());
    let err = assert_ready_err!(blocked.poll());
    assert_eq!(err.kind(), ErrorKind::AdmissionClosed);
    assert_eq!(tracker.max_in_flight(), 0);
    assert_eq!(tracker.configured_max_in_flight(), 1);
}

#[test]
fn test_completed_facets_carry_outcome() {
    let tracker = tracker(2);

    let started = block_on(tracker.admit(PendingOp::new(7, 2))).unwrap();
    let failed = tracker
        .complete(
            started,
            OpOutcome::Failure(FailureCause::new(
                FailureKind::RetriesExhausted,
                "Timeout",
                "timed out",
            )),
        )
        .unwrap();
    assert!(!failed.is_success());
    assert_eq!(failed.cycle(), 7);
    assert_eq!(failed.state(), OpState::Failed);

    let snapshot = tracker.metrics().snapshot();
    assert_eq!(snapshot.started, 1);
    assert_eq!(snapshot.failed_retries_exhausted, 1);
    assert_eq!(snapshot.error_counts.get("Timeout"), Some(&1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admission_never_exceeds_limit() {
    const LIMIT: usize = 3;
    let tracker = Arc::new(tracker(LIMIT));
    let observed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..64u64)
        .map(|cycle| {
            let tracker = Arc::clone(&tracker);
            let observed = Arc::clone(&observed);
            tokio::spawn(async move {
                let op = tracker.admit(PendingOp::new(cycle, 1)).await.unwrap();
                observed.fetch_max(tracker.in_flight(), Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                tracker.complete(op, OpOutcome::Success(json!(cycle))).unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(observed.load(Ordering::SeqCst) <= LIMIT);
    assert_eq!(tracker.in_flight(), 0);
    assert_eq!(tracker.available_slots(), LIMIT);

    tracker.drain().await;
    assert_eq!(tracker.metrics().snapshot().succeeded, 64);
    let err = tracker.admit(PendingOp::new(99, 1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdmissionClosed);
}
