//! Scanner Kubernetes Operator
//!
//! This operator watches `Scanner` resources and dispatches one scan job at a
//! time until every image running in the scanner's namespace has a scan
//! result.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
