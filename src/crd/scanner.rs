//! Scanner Custom Resource Definition

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API version of the Scanner resource
pub const API_VERSION: &str = "scanner.zoltankerezsi.xyz/v1";

/// Condition type summarising scan progress
pub const READY_CONDITION: &str = "Ready";

/// Scanner resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "scanner.zoltankerezsi.xyz",
    version = "v1",
    kind = "Scanner",
    plural = "scanners",
    singular = "scanner",
    shortname = "scn",
    namespaced,
    status = "ScannerStatus",
    printcolumn = r#"{"name": "Ready", "type": "string", "jsonPath": ".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name": "Reason", "type": "string", "jsonPath": ".status.conditions[?(@.type==\"Ready\")].reason"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSpec {
    /// Pods labelled `<exclusionLabel>: "true"` are never scanned
    #[serde(default)]
    pub exclusion_label: String,
}

/// Scanner status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannerStatus {
    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (Ready)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of the last reconciliation pass, stored as the Ready reason
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Observation or action failed
    Failed,
    /// An unscanned image exists but a scan job is still running
    Waiting,
    /// A scan job was dispatched for an unscanned image
    Scanning,
    /// Every observed image has a scan result
    Reconciled,
}

impl Reason {
    /// All reasons, in declaration order
    pub const ALL: [Reason; 4] = [
        Reason::Failed,
        Reason::Waiting,
        Reason::Scanning,
        Reason::Reconciled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Failed => "Failed",
            Reason::Waiting => "Waiting",
            Reason::Scanning => "Scanning",
            Reason::Reconciled => "Reconciled",
        }
    }

    /// Ready condition status for this reason
    pub fn condition_status(&self) -> &'static str {
        match self {
            Reason::Reconciled => "True",
            _ => "False",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Reason::Failed => "Failed to observe cluster state or dispatch a scan job",
            Reason::Waiting => "Waiting for the running scan job to complete",
            Reason::Scanning => "Scan job dispatched for an unscanned image",
            Reason::Reconciled => "All running images have been scanned",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown reason: {}", s))
    }
}

impl Scanner {
    /// The stored Ready condition, if any
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.type_ == READY_CONDITION)
    }

    /// The reason of the stored Ready condition, if it parses
    pub fn ready_reason(&self) -> Option<Reason> {
        self.ready_condition()?.reason.as_deref()?.parse().ok()
    }
}
