//! Dispatch decision engine
//!
//! Converts a point-in-time observation into the single next action and the
//! reason reported on the Scanner's Ready condition. The function is pure so
//! every pass can recompute it from scratch.

use std::collections::HashSet;

use crate::crd::Reason;

/// What the reconciler should do next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanAction {
    /// Nothing to do
    Idle,
    /// An unscanned image exists, but a scan job is already running
    Wait,
    /// Create a scan job for this image identifier
    Dispatch(String),
}

/// Action and reason computed for one pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub action: ScanAction,
    pub reason: Reason,
}

impl Decision {
    /// Outcome of any observation or action error
    pub fn failed() -> Self {
        Self {
            action: ScanAction::Idle,
            reason: Reason::Failed,
        }
    }
}

/// First candidate without a scan result, in input order
pub fn next_target<'a>(scanned: &HashSet<String>, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|image| !scanned.contains(image.as_str()))
        .map(String::as_str)
}

/// Decide the next action.
///
/// At most one scan job may be in flight: while `jobs_in_flight` is set this
/// never returns [`ScanAction::Dispatch`].
pub fn decide(scanned: &HashSet<String>, candidates: &[String], jobs_in_flight: bool) -> Decision {
    match next_target(scanned, candidates) {
        None => Decision {
            action: ScanAction::Idle,
            reason: Reason::Reconciled,
        },
        Some(_) if jobs_in_flight => Decision {
            action: ScanAction::Wait,
            reason: Reason::Waiting,
        },
        Some(target) => Decision {
            action: ScanAction::Dispatch(target.to_string()),
            reason: Reason::Scanning,
        },
    }
}
