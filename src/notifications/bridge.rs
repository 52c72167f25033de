//! Scheduler callbacks published onto the event bus

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::sync::lock_or_recover;
use crate::notifications::event::{Event, InteractionEvent, ScanEvent};
use crate::notifications::manager::NotificationManager;
use crate::scheduler::{
    EmitError, OutcomeRecord, ResultEmitter, ScanState, StatsObserver, StatsSnapshot,
};

/// [`ResultEmitter`] and [`StatsObserver`] that republish as [`Event`]s
///
/// Outcomes that resolved an interaction wait are published twice: once as
/// the outcome itself and once as an [`InteractionEvent`].
#[derive(Clone)]
pub struct BusEmitter {
    bus: Arc<Mutex<NotificationManager>>,
    scan_id: String,
}

impl BusEmitter {
    pub fn new(bus: Arc<Mutex<NotificationManager>>, scan_id: impl Into<String>) -> Self {
        Self {
            bus,
            scan_id: scan_id.into(),
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Publish a scan event for every state the receiver observes
    ///
    /// Ends after a terminal state or when the scan is dropped.
    pub fn follow_state(&self, mut states: watch::Receiver<ScanState>) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            loop {
                let state = *states.borrow_and_update();
                bridge.publish(Event::Scan(ScanEvent::for_state(
                    bridge.scan_id.clone(),
                    state,
                )));
                if state.is_terminal() || states.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn publish(&self, event: Event) {
        let result = lock_or_recover(&self.bus, "notifications").publish(event);
        if let Err(e) = result {
            log::debug!("{}", e);
        }
    }
}

impl ResultEmitter for BusEmitter {
    fn emit(&self, record: &OutcomeRecord) -> Result<(), EmitError> {
        let interaction = InteractionEvent::from_outcome(record);
        self.publish(Event::Outcome(record.clone()));
        if let Some(interaction) = interaction {
            self.publish(Event::Interaction(interaction));
        }
        Ok(())
    }
}

impl StatsObserver for BusEmitter {
    fn on_stats(&self, snapshot: &StatsSnapshot) {
        let mut bus = lock_or_recover(&self.bus, "notifications");
        if let Err(e) = bus.publish(Event::Stats(*snapshot)) {
            log::debug!("{}", e);
        }
        for id in bus.congested_subscribers() {
            log::warn!("Subscriber '{}' is falling behind", id);
        }
        if let Err(e) = bus.check_backlog() {
            log::error!("Event bus backlog: {}", e);
        }
    }
}
