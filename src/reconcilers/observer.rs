//! Cluster observer
//!
//! Reads the running images, the scanned images and the scan job states that
//! the decision engine works from. Nothing here writes to the cluster.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use tracing::debug;

use crate::adapters::job_builder::scan_job_selector;
use crate::adapters::scan_results::{scanned_set, ScanResultSource};
use crate::{Error, Result};

/// Point-in-time view of one namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Image identifiers with a scan result
    pub scanned: HashSet<String>,
    /// Running image identifiers, in pod then container status order
    pub candidates: Vec<String>,
    /// Whether any scan job has not yet succeeded
    pub jobs_in_flight: bool,
}

const MAX_LABEL_NAME_LEN: usize = 63;
const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Check that `exclusion_label` is a valid label key: an optional DNS
/// subdomain prefix and `/`, then a name of at most 63 characters that
/// begins and ends alphanumeric. An empty label disables exclusion.
pub fn validate_exclusion_label(exclusion_label: &str) -> Result<()> {
    if exclusion_label.is_empty() {
        return Ok(());
    }

    let invalid = |why: &str| {
        Error::ConfigError(format!(
            "invalid exclusion label {:?}: {}",
            exclusion_label, why
        ))
    };

    let (prefix, name) = match exclusion_label.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, exclusion_label),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_LABEL_PREFIX_LEN {
            return Err(invalid("prefix must be 1-253 characters"));
        }
        let valid_segment = |segment: &str| {
            !segment.is_empty()
                && segment.starts_with(|c: char| c.is_ascii_alphanumeric())
                && segment.ends_with(|c: char| c.is_ascii_alphanumeric())
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        };
        if !prefix.split('.').all(valid_segment) {
            return Err(invalid("prefix must be a lowercase DNS subdomain"));
        }
    }

    if name.is_empty() || name.len() > MAX_LABEL_NAME_LEN {
        return Err(invalid("name must be 1-63 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric())
        || !name.ends_with(|c: char| c.is_ascii_alphanumeric())
    {
        return Err(invalid("name must begin and end with an alphanumeric character"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid("name may only contain alphanumerics, '-', '_' and '.'"));
    }

    Ok(())
}

/// Whether a pod's labels exclude it from scanning
pub fn is_excluded(labels: Option<&BTreeMap<String, String>>, exclusion_label: &str) -> bool {
    if exclusion_label.is_empty() {
        return false;
    }
    labels
        .and_then(|l| l.get(exclusion_label))
        .is_some_and(|v| v == "true")
}

/// Image identifiers of running containers in pods that are not excluded.
///
/// Init container statuses are not inspected.
pub fn candidate_images(pods: &[Pod], exclusion_label: &str) -> Vec<String> {
    pods.iter()
        .filter(|pod| !is_excluded(pod.metadata.labels.as_ref(), exclusion_label))
        .filter_map(|pod| pod.status.as_ref()?.container_statuses.as_ref())
        .flatten()
        .map(|status| status.image_id.as_str())
        .filter(|image_id| !image_id.is_empty())
        .map(str::to_string)
        .collect()
}

/// A job is in flight until it records at least one success
pub fn job_in_flight(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.succeeded)
        .unwrap_or(0)
        == 0
}

pub fn any_job_in_flight(jobs: &[Job]) -> bool {
    jobs.iter().any(job_in_flight)
}

/// Observe the scan state of `namespace`.
///
/// An invalid exclusion label fails the observation before anything is read.
pub async fn observe<S: ScanResultSource>(
    client: &Client,
    results: &S,
    namespace: &str,
    exclusion_label: &str,
) -> Result<Observation> {
    validate_exclusion_label(exclusion_label)?;

    let scanned = scanned_set(results.list_scan_results().await?);

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pod_list = pods
        .list(&ListParams::default())
        .await
        .map_err(|e| Error::KubeError(format!("Failed to list pods: {}", e)))?;
    let candidates = candidate_images(&pod_list.items, exclusion_label);

    let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
    let job_list = jobs
        .list(&ListParams::default().labels(&scan_job_selector()))
        .await
        .map_err(|e| Error::KubeError(format!("Failed to list scan jobs: {}", e)))?;
    let jobs_in_flight = any_job_in_flight(&job_list.items);

    debug!(
        "Observed {}: {} scanned, {} candidates, {} jobs, in flight={}",
        namespace,
        scanned.len(),
        candidates.len(),
        job_list.items.len(),
        jobs_in_flight
    );

    Ok(Observation {
        scanned,
        candidates,
        jobs_in_flight,
    })
}
