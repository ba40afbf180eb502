//! Controller for Scanner resources

use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Api, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::adapters::job_builder::scan_job_selector;
use crate::controllers::correlator::correlate_pod;
use crate::controllers::Context;
use crate::crd::{Reason, Scanner};
use crate::metrics::prometheus::{
    mark_ready, RECONCILE_DURATION, RECONCILIATIONS, RECONCILIATION_ERRORS,
};
use crate::reconcilers::decision::Decision;
use crate::reconcilers::scanner;
use crate::Error;

/// Requeue delay after a pass that ended in `Failed`
pub const FAILED_REQUEUE: Duration = Duration::from_secs(30);

/// Run the scanner controller
pub async fn run(ctx: Arc<Context>) {
    let client = ctx.client.clone();
    let scanners: Api<Scanner> = Api::all(client.clone());
    let jobs: Api<Job> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());

    info!("Starting Scanner controller");

    let controller = Controller::new(scanners, Config::default().any_semantic());
    let store = controller.store();

    mark_ready();

    controller
        .owns(jobs, Config::default().labels(&scan_job_selector()))
        .watches(pods, Config::default(), move |pod| {
            correlate_pod(&pod, &store.state())
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("Reconciled {:?}", o),
                Err(e) => error!("Reconcile failed: {:?}", e),
            }
        })
        .await;

    info!("Scanner controller stopped");
}

/// Reconcile a Scanner resource
#[instrument(skip(scanner, ctx), fields(name = %scanner.name_any(), namespace = scanner.namespace().unwrap_or_default()))]
async fn reconcile(scanner: Arc<Scanner>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start = std::time::Instant::now();
    let ns = scanner.namespace().unwrap_or_default();
    let name = scanner.name_any();

    RECONCILIATIONS.with_label_values(&["Scanner"]).inc();

    let result = scanner::reconcile(&scanner, &ctx.client, &ctx.results, &ctx.config).await;

    let duration = start.elapsed().as_secs_f64();
    RECONCILE_DURATION
        .with_label_values(&["Scanner"])
        .observe(duration);

    match &result {
        Ok(decision) => info!(
            "Reconciled {}/{} in {:.2}s: {}",
            ns, name, duration, decision.reason
        ),
        Err(e) => {
            RECONCILIATION_ERRORS.with_label_values(&["Scanner"]).inc();
            error!("Failed to reconcile {}/{}: {:?}", ns, name, e);
        }
    }

    Ok(next_action(&result?, ctx.config.reconcile_interval))
}

/// When to run the next pass after `decision`.
///
/// Waiting and Scanning passes are re-triggered by changes to the owned
/// scan job. Reconciled passes fall back to a fixed interval to notice newly
/// scheduled pods.
pub fn next_action(decision: &Decision, reconcile_interval: Duration) -> Action {
    match decision.reason {
        Reason::Reconciled => Action::requeue(reconcile_interval),
        Reason::Failed => Action::requeue(FAILED_REQUEUE),
        Reason::Waiting | Reason::Scanning => Action::await_change(),
    }
}

/// Error policy for the controller
fn error_policy(scanner: Arc<Scanner>, err: &Error, _ctx: Arc<Context>) -> Action {
    let ns = scanner.namespace().unwrap_or_default();
    let name = scanner.name_any();

    error!("Reconciliation error for {}/{}: {:?}", ns, name, err);

    match err {
        Error::KubeError(_) => Action::requeue(Duration::from_secs(30)),
        Error::ConfigError(_) => Action::requeue(Duration::from_secs(300)),
        _ => Action::requeue(Duration::from_secs(60)),
    }
}
