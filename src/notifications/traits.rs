//! Subscriber trait and per-subscriber delivery bookkeeping

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use crate::core::sync::lock_or_recover;
use crate::notifications::event::Event;

/// Delivery counters of one subscription
///
/// `pending` counts events sent but not yet taken off the channel.
#[derive(Debug, Default)]
pub struct SubscriberStatistics {
    pending: AtomicUsize,
    delivered: AtomicUsize,
    failures: AtomicUsize,
    last_delivery: Mutex<Option<Instant>>,
}

impl SubscriberStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub(crate) fn enqueued(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo an `enqueued` for an event that never reached the channel,
    /// or account for one taken off it
    pub(crate) fn dequeued(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn delivered(&self) {
        self.dequeued();
        self.delivered.fetch_add(1, Ordering::Relaxed);
        *lock_or_recover(&self.last_delivery, "subscriber statistics") = Some(Instant::now());
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_delivery(&self) -> Option<Instant> {
        *lock_or_recover(&self.last_delivery, "subscriber statistics")
    }
}

/// Consumer driven by [`run_subscriber`](crate::notifications::api::run_subscriber)
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle_event(
        &self,
        event: Event,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn subscriber_id(&self) -> &str;
}
