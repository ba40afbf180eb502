//! Reconciliation pass for Scanner resources

use k8s_openapi::api::batch::v1::Job;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::{error, info};

use crate::adapters::job_builder;
use crate::adapters::scan_results::ScanResultSource;
use crate::config::OperatorConfig;
use crate::crd::{Reason, Scanner};
use crate::metrics::prometheus::{DECISIONS, SCAN_JOBS_DISPATCHED};
use crate::reconcilers::decision::{decide, Decision, ScanAction};
use crate::reconcilers::{observer, status};
use crate::{Error, Result};

/// Run one level-triggered pass: observe, decide, record the reason and
/// dispatch at most one scan job.
///
/// Observation and dispatch failures are reported as [`Reason::Failed`] on
/// the status; only a failing status write is returned as an error.
pub async fn reconcile<S: ScanResultSource>(
    scanner: &Scanner,
    client: &Client,
    results: &S,
    config: &OperatorConfig,
) -> Result<Decision> {
    let ns = scanner.namespace().unwrap_or_default();
    let name = scanner.name_any();

    let decision =
        match observer::observe(client, results, &ns, &scanner.spec.exclusion_label).await {
            Ok(observation) => decide(
                &observation.scanned,
                &observation.candidates,
                observation.jobs_in_flight,
            ),
            Err(e) => {
                error!("Failed to observe {}/{}: {}", ns, name, e);
                Decision::failed()
            }
        };

    info!(
        "Decision for {}/{}: action={:?}, reason={} (was {:?})",
        ns,
        name,
        decision.action,
        decision.reason,
        scanner.ready_reason()
    );

    status::apply_reason(scanner, client, decision.reason).await?;

    let target = match &decision.action {
        ScanAction::Dispatch(image_id) => Some(image_id.clone()),
        ScanAction::Idle | ScanAction::Wait => None,
    };

    let decision = match target {
        Some(image_id) => match dispatch_scan_job(scanner, client, &image_id, config).await {
            Ok(job_name) => {
                info!("Dispatched scan job {}/{} for {}", ns, job_name, image_id);
                decision
            }
            Err(e) => {
                error!("Failed to dispatch scan job for {}: {}", image_id, e);
                let current = refreshed(scanner, client).await?;
                status::apply_reason(&current, client, Reason::Failed).await?;
                Decision::failed()
            }
        },
        None => decision,
    };

    DECISIONS.with_label_values(&[decision.reason.as_str()]).inc();

    Ok(decision)
}

/// Build and persist a scan job, returning its name
async fn dispatch_scan_job(
    scanner: &Scanner,
    client: &Client,
    image_id: &str,
    config: &OperatorConfig,
) -> Result<String> {
    let ns = scanner.namespace().unwrap_or_default();
    let job = job_builder::build_scan_job(scanner, image_id, config)?;

    let jobs: Api<Job> = Api::namespaced(client.clone(), &ns);
    let created = jobs
        .create(&PostParams::default(), &job)
        .await
        .map_err(|e| Error::KubeError(format!("Failed to create scan job: {}", e)))?;

    SCAN_JOBS_DISPATCHED.with_label_values(&[ns.as_str()]).inc();

    Ok(created.name_any())
}

/// Re-read the scanner so a second status write carries a fresh
/// resourceVersion
async fn refreshed(scanner: &Scanner, client: &Client) -> Result<Scanner> {
    let ns = scanner.namespace().unwrap_or_default();
    let scanners: Api<Scanner> = Api::namespaced(client.clone(), &ns);
    scanners
        .get(&scanner.name_any())
        .await
        .map_err(|e| Error::KubeError(format!("Failed to get scanner: {}", e)))
}
