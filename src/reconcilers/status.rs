//! Status condition reconciler

use chrono::{DateTime, Utc};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::crd::{Condition, Reason, Scanner, READY_CONDITION};
use crate::{Error, Result};

/// Whether a stored condition already reflects `reason`
fn reflects(condition: &Condition, reason: Reason) -> bool {
    condition.type_ == READY_CONDITION
        && condition.status == reason.condition_status()
        && condition.reason.as_deref() == Some(reason.as_str())
}

/// Compute the condition list for `reason`.
///
/// Returns `None` when the stored Ready condition already matches, in which
/// case no write must happen. Otherwise the Ready condition is replaced in
/// place and conditions of other types are kept.
pub fn next_conditions(
    existing: &[Condition],
    reason: Reason,
    now: DateTime<Utc>,
) -> Option<Vec<Condition>> {
    let mut ready = existing.iter().filter(|c| c.type_ == READY_CONDITION);
    let current = ready.next();
    let duplicated = ready.next().is_some();

    if !duplicated && current.is_some_and(|c| reflects(c, reason)) {
        return None;
    }

    // lastTransitionTime only moves when the status flips
    let last_transition_time = current
        .filter(|c| c.status == reason.condition_status())
        .map(|c| c.last_transition_time)
        .unwrap_or(now);

    let condition = Condition {
        type_: READY_CONDITION.to_string(),
        status: reason.condition_status().to_string(),
        last_transition_time,
        reason: Some(reason.as_str().to_string()),
        message: Some(reason.message().to_string()),
    };

    let mut conditions = Vec::with_capacity(existing.len().max(1));
    let mut placed = false;
    for c in existing {
        if c.type_ != READY_CONDITION {
            conditions.push(c.clone());
        } else if !placed {
            conditions.push(condition.clone());
            placed = true;
        }
    }
    if !placed {
        conditions.push(condition);
    }

    Some(conditions)
}

/// Apply `reason` to the Scanner's Ready condition.
///
/// Returns whether a status write was performed. The patch carries the
/// observed resourceVersion, so a stale view fails with a conflict instead of
/// overwriting a concurrent update.
pub async fn apply_reason(scanner: &Scanner, client: &Client, reason: Reason) -> Result<bool> {
    let name = scanner.name_any();
    let namespace = scanner.namespace().unwrap_or_default();

    let existing = scanner
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();

    let Some(conditions) = next_conditions(existing, reason, Utc::now()) else {
        debug!("Status of {}/{} already {}", namespace, name, reason);
        return Ok(false);
    };

    let patch = serde_json::json!({
        "metadata": {
            "resourceVersion": scanner.resource_version(),
        },
        "status": {
            "conditions": conditions,
        }
    });

    let scanners: Api<Scanner> = Api::namespaced(client.clone(), &namespace);
    scanners
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| Error::KubeError(format!("Failed to update status: {}", e)))?;

    info!("Updated status for {}/{}: reason={}", namespace, name, reason);

    Ok(true)
}
