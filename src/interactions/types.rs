//! Interaction correlation types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Default interval between expiry sweeps
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default lifetime of an unresolved token
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(60);
/// Default wait for late callbacks once dispatching has finished
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// One callback reported by the interaction server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct InteractionPayload {
    pub protocol: String,
    pub unique_id: String,
    pub full_id: String,
    pub raw_request: String,
    pub raw_response: String,
    pub remote_address: String,
    pub timestamp: String,
}

/// How an out-of-band wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Confirmed(InteractionPayload),
    NoInteraction,
    Canceled,
}

/// The work item a token was issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItemRef {
    pub template_id: String,
    pub target: String,
}

impl WorkItemRef {
    pub fn new(template_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorConfig {
    pub poll_interval: Duration,
    pub token_timeout: Duration,
    pub cooldown: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Counters since the correlator was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    pub issued: u64,
    pub confirmed: u64,
    pub expired: u64,
    /// Callbacks for unknown, expired or already resolved tokens
    pub dropped: u64,
    pub canceled: u64,
    pub pending: usize,
}

/// Token handed to the executor plus the receiving half of its outcome
#[derive(Debug)]
pub struct Registration {
    pub token: String,
    pub waiter: InteractionWaiter,
}

/// Receives the single outcome of one correlation token
#[derive(Debug)]
pub struct InteractionWaiter {
    receiver: oneshot::Receiver<InteractionOutcome>,
}

impl InteractionWaiter {
    pub(crate) fn new(receiver: oneshot::Receiver<InteractionOutcome>) -> Self {
        Self { receiver }
    }

    /// Wait for the outcome; a dropped correlator reads as `Canceled`
    pub async fn wait(self) -> InteractionOutcome {
        self.receiver.await.unwrap_or(InteractionOutcome::Canceled)
    }

    /// Wait for the outcome or scan cancellation, whichever comes first
    pub async fn wait_or_cancel(self, cancel: &CancellationToken) -> InteractionOutcome {
        tokio::select! {
            biased;
            outcome = self.wait() => outcome,
            _ = cancel.cancelled() => InteractionOutcome::Canceled,
        }
    }
}
