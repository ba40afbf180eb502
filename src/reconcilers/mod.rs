//! Reconciliation logic for Scanner resources

pub mod decision;
pub mod observer;
pub mod scanner;
pub mod status;
