//! NotificationManager implementation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::notifications::error::NotificationError;
use crate::notifications::event::{Event, EventFilter};
use crate::notifications::traits::{Subscriber, SubscriberStatistics};

// Pending events at which a single subscriber counts as congested
const HIGH_WATER_MARK: usize = 10_000;
// Pending events across all subscribers reported as a backlog
const BACKLOG_LIMIT: usize = 1_000_000;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
    statistics: Arc<SubscriberStatistics>,
}

/// Receiving half handed out by [`NotificationManager::subscribe`]
///
/// Keeps the subscriber's queue statistics current as events are taken.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: UnboundedReceiver<Event>,
    statistics: Arc<SubscriberStatistics>,
}

impl EventReceiver {
    /// Next event, or `None` once the subscriber has been removed
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.receiver.recv().await?;
        self.taken();
        Some(event)
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        let event = self.receiver.try_recv().ok()?;
        self.taken();
        Some(event)
    }

    pub fn statistics(&self) -> &SubscriberStatistics {
        &self.statistics
    }

    fn taken(&self) {
        self.statistics.delivered();
    }
}

/// In-process fan-out of scan events to filtered subscribers
#[derive(Default)]
pub struct NotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> EventReceiver {
        let (sender, receiver) = unbounded_channel();
        let statistics = Arc::new(SubscriberStatistics::new());

        let subscriber_info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            statistics: Arc::clone(&statistics),
        };

        // Warn if overwriting existing subscriber
        if let Some(existing) = self.subscribers.insert(subscriber_id.clone(), subscriber_info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        } else {
            log::trace!("Subscriber '{}' registered from {}", subscriber_id, source);
        }

        EventReceiver {
            receiver,
            statistics,
        }
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    pub fn subscriber_statistics(&self, subscriber_id: &str) -> Option<Arc<SubscriberStatistics>> {
        self.subscribers
            .get(subscriber_id)
            .map(|info| Arc::clone(&info.statistics))
    }

    /// Subscribers with at least `HIGH_WATER_MARK` events not yet taken
    pub fn congested_subscribers(&self) -> Vec<String> {
        self.subscribers
            .iter()
            .filter(|(_, info)| info.statistics.pending() >= HIGH_WATER_MARK)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn check_backlog(&self) -> Result<(), NotificationError> {
        let pending: Vec<(String, usize)> = self
            .subscribers
            .iter()
            .map(|(id, info)| (id.clone(), info.statistics.pending()))
            .collect();
        let total: usize = pending.iter().map(|(_, n)| n).sum();

        if total > BACKLOG_LIMIT {
            return Err(NotificationError::Backlog { pending, total });
        }
        Ok(())
    }

    /// Deliver `event` to every subscriber whose filter accepts it
    ///
    /// Subscribers whose receiver is gone are removed; the error lists them.
    pub fn publish(&mut self, event: Event) -> Result<(), NotificationError> {
        let mut closed = Vec::new();

        for (id, info) in &self.subscribers {
            if !info.filter.accepts(&event) {
                continue;
            }
            info.statistics.enqueued();
            if info.sender.send(event.clone()).is_err() {
                info.statistics.dequeued();
                closed.push(id.clone());
            }
        }

        if closed.is_empty() {
            return Ok(());
        }
        for id in &closed {
            log::debug!("Removing closed subscriber '{}'", id);
            self.subscribers.remove(id);
        }
        Err(NotificationError::ClosedSubscribers {
            event_kind: event.kind().to_string(),
            subscribers: closed,
        })
    }
}

/// Feed every event from `receiver` to `subscriber` until the channel closes
pub async fn run_subscriber(mut receiver: EventReceiver, subscriber: Arc<dyn Subscriber>) {
    while let Some(event) = receiver.recv().await {
        if let Err(e) = subscriber.handle_event(event).await {
            receiver.statistics().record_failure();
            log::warn!(
                "Subscriber '{}' failed to handle event: {}",
                subscriber.subscriber_id(),
                e
            );
        }
    }
    log::trace!("Subscriber '{}' finished", subscriber.subscriber_id());
}
