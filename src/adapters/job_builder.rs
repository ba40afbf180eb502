//! Kubernetes Job builder for scan jobs

use chrono::Utc;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::OperatorConfig;
use crate::crd::{Scanner, API_VERSION};
use crate::{Error, Result};

/// Label selecting jobs created by this operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`] on scan jobs
pub const MANAGED_BY: &str = "scanner-operator";

/// Annotation carrying the image identifier a job scans
pub const IMAGE_ID_ANNOTATION: &str = "scanner.zoltankerezsi.xyz/image-id";

const NAME_SUFFIX_LEN: usize = 10;

/// Label selector matching every scan job
pub fn scan_job_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY)
}

/// Generate a unique scan job name for an image
pub fn scan_job_name(image_id: &str, nonce: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_id.as_bytes());
    hasher.update(nonce.to_be_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("scan-{}", &digest[..NAME_SUFFIX_LEN])
}

/// Build a not-yet-persisted scan Job for `image_id`, owned by `scanner`
pub fn build_scan_job(scanner: &Scanner, image_id: &str, config: &OperatorConfig) -> Result<Job> {
    if image_id.is_empty() {
        return Err(Error::JobBuildError("image id cannot be empty".to_string()));
    }

    let scanner_name = scanner
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::JobBuildError("scanner has no name".to_string()))?;
    let namespace = scanner
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| Error::JobBuildError("scanner has no namespace".to_string()))?;

    let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let name = scan_job_name(image_id, nonce);
    let labels = build_labels(&scanner_name);

    let mut annotations = BTreeMap::new();
    annotations.insert(IMAGE_ID_ANNOTATION.to_string(), image_id.to_string());

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.clone()),
            labels: Some(labels.clone()),
            annotations: Some(annotations),
            owner_references: Some(vec![build_owner_reference(scanner)?]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(image_id, &namespace, config)),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn build_pod_spec(image_id: &str, namespace: &str, config: &OperatorConfig) -> PodSpec {
    let env = vec![
        env_var("IMAGE_ID", image_id),
        env_var("NAMESPACE", namespace),
        env_var("API_SERVICE_HOSTNAME", &config.api_service_hostname),
    ];

    PodSpec {
        containers: vec![Container {
            name: "scanner".to_string(),
            image: Some(config.scanner_image.clone()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            env: Some(env),
            ..Default::default()
        }],
        restart_policy: Some("Never".to_string()),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn build_labels(scanner_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), "scan-job".to_string());
    labels.insert("app.kubernetes.io/instance".to_string(), scanner_name.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels
}

fn build_owner_reference(scanner: &Scanner) -> Result<OwnerReference> {
    let uid = scanner
        .metadata
        .uid
        .clone()
        .ok_or_else(|| Error::JobBuildError("scanner has no uid".to_string()))?;

    Ok(OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: "Scanner".to_string(),
        name: scanner.metadata.name.clone().unwrap_or_default(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
