//! Integration tests for the cluster observer helpers
//!
//! These tests verify candidate image extraction, the exclusion label
//! predicate and the jobs-in-flight check.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use scanner_operator::reconcilers::observer::{
    any_job_in_flight, candidate_images, is_excluded, job_in_flight, validate_exclusion_label,
};
use scanner_operator::Error;

const EXCLUDE: &str = "scanner.zoltankerezsi.xyz/exclude";

// ============================================================================
// Test Helpers
// ============================================================================

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn container_status(name: &str, image_id: &str) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        image: format!("{}:latest", name),
        image_id: image_id.to_string(),
        ready: true,
        restart_count: 0,
        ..Default::default()
    }
}

fn pod(name: &str, pod_labels: &[(&str, &str)], image_ids: &[&str]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels(pod_labels)),
            ..Default::default()
        },
        status: Some(PodStatus {
            container_statuses: Some(
                image_ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| container_status(&format!("c{}", i), id))
                    .collect(),
            ),
            init_container_statuses: Some(vec![container_status("init", "init-image")]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn job(succeeded: Option<i32>) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some("scan-0123456789".to_string()),
            ..Default::default()
        },
        status: Some(JobStatus {
            succeeded,
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Exclusion Predicate Tests
// ============================================================================

#[test]
fn label_set_to_true_excludes() {
    assert!(is_excluded(Some(&labels(&[(EXCLUDE, "true")])), EXCLUDE));
}

#[test]
fn other_values_do_not_exclude() {
    assert!(!is_excluded(Some(&labels(&[(EXCLUDE, "false")])), EXCLUDE));
    assert!(!is_excluded(Some(&labels(&[(EXCLUDE, "True")])), EXCLUDE));
    assert!(!is_excluded(Some(&labels(&[("other", "true")])), EXCLUDE));
    assert!(!is_excluded(None, EXCLUDE));
}

#[test]
fn empty_exclusion_label_excludes_nothing() {
    assert!(!is_excluded(Some(&labels(&[("", "true")])), ""));
}

// ============================================================================
// Candidate Image Tests
// ============================================================================

#[test]
fn candidates_follow_pod_then_container_order() {
    let pods = vec![
        pod("first", &[], &["img-b", "img-a"]),
        pod("second", &[], &["img-c"]),
    ];
    assert_eq!(
        candidate_images(&pods, EXCLUDE),
        vec!["img-b".to_string(), "img-a".to_string(), "img-c".to_string()]
    );
}

#[test]
fn excluded_pods_contribute_nothing() {
    let pods = vec![
        pod("skipped", &[(EXCLUDE, "true")], &["img-secret"]),
        pod("kept", &[(EXCLUDE, "false")], &["img-a"]),
    ];
    let candidates = candidate_images(&pods, EXCLUDE);
    assert_eq!(candidates, vec!["img-a".to_string()]);
    assert!(!candidates.contains(&"img-secret".to_string()));
}

#[test]
fn empty_image_ids_and_init_containers_are_skipped() {
    let pods = vec![pod("starting", &[], &["", "img-a"])];
    assert_eq!(candidate_images(&pods, EXCLUDE), vec!["img-a".to_string()]);
}

#[test]
fn pods_without_status_are_skipped() {
    let mut pending = pod("pending", &[], &[]);
    pending.status = None;
    assert!(candidate_images(&[pending], EXCLUDE).is_empty());
}

// ============================================================================
// Jobs In Flight Tests
// ============================================================================

#[test]
fn job_without_success_is_in_flight() {
    assert!(job_in_flight(&job(None)));
    assert!(job_in_flight(&job(Some(0))));
    assert!(job_in_flight(&Job::default()));
}

#[test]
fn succeeded_job_is_not_in_flight() {
    assert!(!job_in_flight(&job(Some(1))));
}

#[test]
fn any_unfinished_job_blocks() {
    assert!(!any_job_in_flight(&[]));
    assert!(!any_job_in_flight(&[job(Some(1)), job(Some(2))]));
    assert!(any_job_in_flight(&[job(Some(1)), job(None)]));
}

// ============================================================================
// Exclusion Label Validation Tests
// ============================================================================

#[test]
fn well_formed_labels_are_accepted() {
    for label in ["", "skip", EXCLUDE, "scan.io/no_scan", "a", "team-a.example.com/x.y-z"] {
        assert!(validate_exclusion_label(label).is_ok(), "{}", label);
    }
}

#[test]
fn malformed_labels_are_config_errors() {
    let too_long = "a".repeat(64);
    for label in [
        "bad key!",
        "/skip",
        "example.com/",
        "-skip",
        "skip-",
        "Example.com/skip",
        "a/b/c",
        too_long.as_str(),
    ] {
        let err = validate_exclusion_label(label).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)), "{}", label);
    }
}
