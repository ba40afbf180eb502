//! Integration tests for the dispatch decision engine
//!
//! These tests verify the action and reason chosen for a given observation,
//! including the single-job admission rule and convergence to Reconciled.

use std::collections::HashSet;
use std::time::Duration;

use kube::runtime::controller::Action;
use scanner_operator::controllers::scanner_controller::{next_action, FAILED_REQUEUE};
use scanner_operator::crd::Reason;
use scanner_operator::reconcilers::decision::{decide, next_target, Decision, ScanAction};

// ============================================================================
// Test Helpers
// ============================================================================

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Worked Examples
// ============================================================================

#[test]
fn dispatches_first_unscanned_image() {
    let decision = decide(&set(&["img-a"]), &list(&["img-a", "img-b"]), false);
    assert_eq!(decision.action, ScanAction::Dispatch("img-b".to_string()));
    assert_eq!(decision.reason, Reason::Scanning);
}

#[test]
fn waits_while_a_job_is_in_flight() {
    let decision = decide(&set(&["img-a"]), &list(&["img-a", "img-b"]), true);
    assert_eq!(decision.action, ScanAction::Wait);
    assert_eq!(decision.reason, Reason::Waiting);
}

#[test]
fn reconciled_when_everything_is_scanned() {
    let decision = decide(&set(&["img-a"]), &list(&["img-a"]), false);
    assert_eq!(decision.action, ScanAction::Idle);
    assert_eq!(decision.reason, Reason::Reconciled);
}

#[test]
fn failed_decision_is_idle() {
    let decision = Decision::failed();
    assert_eq!(decision.action, ScanAction::Idle);
    assert_eq!(decision.reason, Reason::Failed);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn reconciled_with_no_candidates_even_if_jobs_run() {
    let decision = decide(&set(&[]), &[], true);
    assert_eq!(decision.reason, Reason::Reconciled);
}

#[test]
fn decide_is_idempotent() {
    let scanned = set(&["b"]);
    let candidates = list(&["a", "b", "c"]);
    for in_flight in [false, true] {
        assert_eq!(
            decide(&scanned, &candidates, in_flight),
            decide(&scanned, &candidates, in_flight)
        );
    }
}

#[test]
fn never_dispatches_while_in_flight() {
    let cases: Vec<(HashSet<String>, Vec<String>)> = vec![
        (set(&[]), list(&["a"])),
        (set(&["a"]), list(&["a", "b", "c"])),
        (set(&[]), list(&["a", "a", "b"])),
        (set(&["a", "b"]), list(&["a", "b"])),
    ];
    for (scanned, candidates) in cases {
        let decision = decide(&scanned, &candidates, true);
        assert!(!matches!(decision.action, ScanAction::Dispatch(_)));
    }
}

#[test]
fn target_follows_input_order() {
    let candidates = list(&["z", "a", "m"]);
    assert_eq!(next_target(&set(&[]), &candidates), Some("z"));
    assert_eq!(next_target(&set(&["z"]), &candidates), Some("a"));
    assert_eq!(next_target(&set(&["z", "a", "m"]), &candidates), None);
}

#[test]
fn converges_to_reconciled() {
    let candidates = list(&["a", "b", "a", "c", "d", "b"]);
    let mut scanned = HashSet::new();
    let mut dispatched = Vec::new();

    for _ in 0..=candidates.len() {
        let decision = decide(&scanned, &candidates, false);
        match decision.action {
            ScanAction::Dispatch(image) => {
                assert!(!scanned.contains(&image), "image scanned twice: {}", image);
                dispatched.push(image.clone());
                // simulate the job succeeding and its result being recorded
                scanned.insert(image);
            }
            ScanAction::Idle => {
                assert_eq!(decision.reason, Reason::Reconciled);
                break;
            }
            ScanAction::Wait => panic!("no job was in flight"),
        }
    }

    assert_eq!(dispatched, list(&["a", "b", "c", "d"]));
    assert_eq!(decide(&scanned, &candidates, false).reason, Reason::Reconciled);
}

// ============================================================================
// Requeue Policy
// ============================================================================

#[test]
fn reconciled_requeues_after_interval() {
    let decision = decide(&set(&["a"]), &list(&["a"]), false);
    assert_eq!(
        next_action(&decision, Duration::from_secs(10)),
        Action::requeue(Duration::from_secs(10))
    );
}

#[test]
fn failed_requeues_after_backoff() {
    assert_eq!(
        next_action(&Decision::failed(), Duration::from_secs(10)),
        Action::requeue(FAILED_REQUEUE)
    );
}

#[test]
fn waiting_and_scanning_await_job_changes() {
    let waiting = decide(&set(&[]), &list(&["a"]), true);
    let scanning = decide(&set(&[]), &list(&["a"]), false);
    assert_eq!(
        next_action(&waiting, Duration::from_secs(10)),
        Action::await_change()
    );
    assert_eq!(
        next_action(&scanning, Duration::from_secs(10)),
        Action::await_change()
    );
}
