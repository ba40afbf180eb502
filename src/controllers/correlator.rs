//! Maps pod changes back to the Scanner that covers the pod's namespace

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use crate::crd::Scanner;

/// Scanner to reconcile when `pod` changes.
///
/// One Scanner per namespace is assumed. When several exist, the first by
/// name is chosen so the mapping is stable. Returns an empty list when no
/// Scanner covers the namespace.
pub fn correlate_pod(pod: &Pod, scanners: &[Arc<Scanner>]) -> Vec<ObjectRef<Scanner>> {
    let Some(namespace) = pod.namespace() else {
        return Vec::new();
    };

    scanners
        .iter()
        .filter(|s| s.namespace().as_deref() == Some(namespace.as_str()))
        .min_by_key(|s| s.name_any())
        .map(|s| ObjectRef::from_obj(&**s))
        .into_iter()
        .collect()
}
