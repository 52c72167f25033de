//! Out-of-band interaction correlation
//!
//! Templates that confirm a finding through a side channel (a DNS lookup or
//! HTTP request reaching an interaction server) embed a correlation token in
//! their probe. The executor registers the token here and gets back a
//! waiter. The waiter completes exactly once, with one of:
//!
//! - `Confirmed(payload)` when the interaction server reports a callback,
//! - `NoInteraction` when the token outlives its timeout,
//! - `Canceled` when the scan is cancelled.
//!
//! ```rust,no_run
//! use scanmatrix::interactions::{CorrelatorConfig, InteractionCorrelator, WorkItemRef};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let correlator = Arc::new(InteractionCorrelator::new(CorrelatorConfig::default()));
//! let poller = correlator.start(CancellationToken::new());
//!
//! let registration = correlator.register(WorkItemRef::new("ssrf-oob", "https://example.com"));
//! // ... send a probe containing registration.token ...
//! let outcome = registration.waiter.wait().await;
//! # drop((poller, outcome));
//! # }
//! ```

mod correlator;
mod types;

pub use correlator::{InteractionCorrelator, InteractionError, TOKEN_LEN};
pub use types::{
    CorrelatorConfig, CorrelatorStats, InteractionOutcome, InteractionPayload, InteractionWaiter,
    Registration, WorkItemRef, DEFAULT_COOLDOWN, DEFAULT_POLL_INTERVAL, DEFAULT_TOKEN_TIMEOUT,
};
