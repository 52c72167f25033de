pub mod app;
pub mod core;
pub mod hosterrors;
pub mod interactions;
pub mod notifications;
pub mod offlinehttp;
pub mod ratelimit;
pub mod scheduler;
