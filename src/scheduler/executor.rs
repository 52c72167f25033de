//! Boundary to the protocol executors
//!
//! The scheduler knows nothing about HTTP, DNS or browsers. It hands each
//! work item to an [`Executor`] together with an [`ExecutionContext`] and
//! classifies what comes back.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::WorkItem;
use crate::core::retry::Transient;
use crate::hosterrors::HostErrorCache;
use crate::interactions::{InteractionCorrelator, InteractionWaiter};
use crate::ratelimit::RateLimiter;

/// Error kind used when an attempt exceeds the per-request timeout
pub const TIMEOUT_ERROR_KIND: &str = "timeout";

/// Shared handles and per-attempt facts passed to every execution
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Zero-based attempt number
    pub attempt: u32,
    pub deadline: Instant,
    pub cancel: CancellationToken,
    pub rate_limiter: Arc<RateLimiter>,
    pub host_errors: Arc<HostErrorCache>,
    /// Present when out-of-band interactions are enabled
    pub correlator: Option<Arc<InteractionCorrelator>>,
}

/// What one successful execution produced
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub matched: bool,
    /// Set when the probe awaits an out-of-band callback
    pub interaction: Option<InteractionWaiter>,
}

impl ExecutionResult {
    pub fn completed() -> Self {
        Self::default()
    }

    pub fn matched() -> Self {
        Self {
            matched: true,
            interaction: None,
        }
    }

    pub fn awaiting_interaction(waiter: InteractionWaiter) -> Self {
        Self {
            matched: false,
            interaction: Some(waiter),
        }
    }
}

/// Failure of one execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Classification used by the host error cache (`timeout`, `refused`, ...)
    pub kind: String,
    pub message: String,
    pub transient: bool,
}

impl ExecutionError {
    /// A failure worth another attempt
    pub fn transient(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            transient: true,
        }
    }

    pub fn terminal(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub(crate) fn timed_out(item: &WorkItem) -> Self {
        Self::transient(
            TIMEOUT_ERROR_KIND,
            format!("{} timed out against {}", item.template.id, item.target.raw),
        )
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExecutionError {}

impl Transient for ExecutionError {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

/// Runs one template against one target
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError>;
}
