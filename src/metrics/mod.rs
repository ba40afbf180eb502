//! Prometheus metrics for the Scanner Operator
//!
//! This module exposes metrics for monitoring operator health and scan
//! progress.

pub mod prometheus;

pub use self::prometheus::*;
