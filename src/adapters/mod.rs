//! Adapters for external collaborators: the scan result store and the scan
//! job builder

pub mod job_builder;
pub mod scan_results;
