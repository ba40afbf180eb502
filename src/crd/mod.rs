//! Custom Resource Definitions for the Scanner Operator

mod scanner;

pub use scanner::*;

use kube::CustomResourceExt;

/// Generate CRD YAML manifests for all custom resources
pub fn generate_crds() -> Vec<String> {
    vec![serde_yaml::to_string(&Scanner::crd()).unwrap()]
}
