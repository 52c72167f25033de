//! Token table matching callbacks to waiting work items

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::types::{
    CorrelatorConfig, CorrelatorStats, InteractionOutcome, InteractionPayload, InteractionWaiter,
    Registration, WorkItemRef,
};
use crate::core::sync::lock_or_recover;
use crate::core::time::{Clock, SystemClock};

/// Length of an issued token (uuid v4 in simple form)
pub const TOKEN_LEN: usize = 32;

// Upper bound on a single sleep while draining
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("Malformed interaction callback: {0}")]
    MalformedCallback(#[from] serde_json::Error),
}

#[derive(Debug)]
struct PendingInteraction {
    issued_at: Instant,
    item: WorkItemRef,
    sender: oneshot::Sender<InteractionOutcome>,
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    confirmed: AtomicU64,
    expired: AtomicU64,
    dropped: AtomicU64,
    canceled: AtomicU64,
}

/// Issues correlation tokens and resolves each one exactly once
///
/// An entry is resolved by whoever removes it from the table: a callback,
/// the expiry sweep, or shutdown. Everyone arriving later finds nothing.
#[derive(Debug)]
pub struct InteractionCorrelator {
    config: CorrelatorConfig,
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, PendingInteraction>>,
    counters: Counters,
}

impl InteractionCorrelator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CorrelatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            pending: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Issue a fresh token for `item`
    pub fn register(&self, item: WorkItemRef) -> Registration {
        let token = Uuid::new_v4().simple().to_string();
        let (sender, receiver) = oneshot::channel();

        log::trace!(
            "Issued interaction token {} for {} on {}",
            token,
            item.template_id,
            item.target
        );
        lock_or_recover(&self.pending, "interaction correlator").insert(
            token.clone(),
            PendingInteraction {
                issued_at: self.clock.now(),
                item,
                sender,
            },
        );
        self.counters.issued.fetch_add(1, Ordering::Relaxed);

        Registration {
            token,
            waiter: InteractionWaiter::new(receiver),
        }
    }

    /// Deliver a callback for `token`
    ///
    /// Returns false when the token is unknown, expired or already resolved;
    /// such callbacks are dropped.
    pub fn resolve(&self, token: &str, payload: InteractionPayload) -> bool {
        let key = correlation_key(token);
        let entry = lock_or_recover(&self.pending, "interaction correlator").remove(&key);

        match entry {
            Some(pending) => {
                log::debug!(
                    "Interaction confirmed for {} on {} via {}",
                    pending.item.template_id,
                    pending.item.target,
                    payload.protocol
                );
                // The waiter may have given up already; the token is spent either way
                let _ = pending.sender.send(InteractionOutcome::Confirmed(payload));
                self.counters.confirmed.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                log::trace!("Dropping callback for unknown token {}", key);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Deliver a callback in the interaction server's JSON form
    ///
    /// The server reports the queried label; anything after the token
    /// (a per-request nonce) is ignored.
    pub fn resolve_json(&self, json: &str) -> Result<bool, InteractionError> {
        let payload: InteractionPayload = serde_json::from_str(json)?;
        let token = payload.unique_id.clone();
        Ok(self.resolve(&token, payload))
    }

    /// Expire every token older than the configured timeout
    ///
    /// Returns the number of tokens expired.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.config.token_timeout;

        let expired: Vec<PendingInteraction> = {
            let mut pending = lock_or_recover(&self.pending, "interaction correlator");
            let stale: Vec<String> = pending
                .iter()
                .filter(|(_, entry)| now.saturating_duration_since(entry.issued_at) >= timeout)
                .map(|(token, _)| token.clone())
                .collect();
            stale
                .iter()
                .filter_map(|token| pending.remove(token))
                .collect()
        };

        let count = expired.len();
        for entry in expired {
            log::trace!(
                "No interaction for {} on {}",
                entry.item.template_id,
                entry.item.target
            );
            let _ = entry.sender.send(InteractionOutcome::NoInteraction);
        }
        if count > 0 {
            self.counters
                .expired
                .fetch_add(count as u64, Ordering::Relaxed);
            log::debug!("Expired {} interaction tokens", count);
        }
        count
    }

    /// Run the expiry sweep every poll interval until `cancel` fires
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let correlator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(correlator.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        correlator.sweep_expired();
                    }
                }
            }
            log::trace!("Interaction poller stopped");
        })
    }

    /// Wait up to `cooldown` for outstanding callbacks, then expire the rest
    pub async fn drain(&self, cooldown: Duration, cancel: &CancellationToken) {
        let deadline = Instant::now() + cooldown;
        while self.pending() > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let step = (deadline - now).min(DRAIN_CHECK_INTERVAL);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancel_all();
                    return;
                }
                _ = sleep(step) => {}
            }
        }
        self.expire_all();
    }

    /// Release every waiter with `Canceled`
    pub fn cancel_all(&self) -> usize {
        let drained = self.take_all();
        let count = drained.len();
        for entry in drained {
            let _ = entry.sender.send(InteractionOutcome::Canceled);
        }
        self.counters
            .canceled
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn pending(&self) -> usize {
        lock_or_recover(&self.pending, "interaction correlator").len()
    }

    pub fn stats(&self) -> CorrelatorStats {
        CorrelatorStats {
            issued: self.counters.issued.load(Ordering::Relaxed),
            confirmed: self.counters.confirmed.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            canceled: self.counters.canceled.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }

    fn expire_all(&self) {
        let drained = self.take_all();
        let count = drained.len();
        for entry in drained {
            let _ = entry.sender.send(InteractionOutcome::NoInteraction);
        }
        self.counters
            .expired
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn take_all(&self) -> Vec<PendingInteraction> {
        lock_or_recover(&self.pending, "interaction correlator")
            .drain()
            .map(|(_, entry)| entry)
            .collect()
    }
}

/// Lower-case the label and cut it down to the token length
fn correlation_key(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    match label.char_indices().nth(TOKEN_LEN) {
        Some((cut, _)) => label[..cut].to_string(),
        None => label,
    }
}
