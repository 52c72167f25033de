//! Scan engine integration test modules

pub mod cancellation;
pub mod host_errors;
pub mod interactions;
pub mod modes;
pub mod pools;
pub mod retries;
