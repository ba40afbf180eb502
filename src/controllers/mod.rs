//! Controller implementations for watching and reconciling resources

pub mod correlator;
pub mod scanner_controller;

use kube::Client;
use std::sync::Arc;

use crate::adapters::scan_results::DatabaseScanResultSource;
use crate::config::OperatorConfig;

/// Shared context for controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator configuration
    pub config: OperatorConfig,
    /// Scan result store
    pub results: DatabaseScanResultSource,
}

impl Context {
    /// Create a new context
    pub fn new(
        client: Client,
        config: OperatorConfig,
        results: DatabaseScanResultSource,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            config,
            results,
        })
    }
}
