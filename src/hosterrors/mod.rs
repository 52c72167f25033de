//! Host error circuit breaker
//!
//! Counts consecutive failures per host and tells the scheduler to stop
//! probing a host once the count reaches the configured threshold. A single
//! success closes the circuit again. The number of tracked hosts is bounded;
//! the least recently touched host is forgotten first.

mod cache;
mod key;

pub use cache::{
    HostErrorCache, HostErrorConfig, HostErrorRecord, DEFAULT_MAX_HOSTS_COUNT,
    DEFAULT_MAX_HOST_ERROR,
};
pub use key::normalize_host_key;
