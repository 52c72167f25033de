//! Core services and infrastructure shared by the scan engine components

pub mod error_handling;
pub mod logging;
pub mod retry;
pub mod shutdown;
pub mod sync;
pub mod time;
pub mod validation;
pub mod version;
