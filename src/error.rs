//! Error types for the Scanner Operator

use thiserror::Error;

/// Result type for the operator
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the operator
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Scan result store error
    #[error("Scan result error: {0}")]
    ScanResultError(String),
    /// Scan job could not be built
    #[error("Job build error: {0}")]
    JobBuildError(String),
}
