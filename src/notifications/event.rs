//! Event types for the notification system

use std::time::SystemTime;

use crate::scheduler::{OutcomeKind, OutcomeRecord, ScanState, StatsSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanEventType {
    Started,
    StateChanged,
    Completed,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionEventType {
    Confirmed,
    Expired,
}

/// Scan lifecycle change
#[derive(Clone, Debug)]
pub struct ScanEvent {
    pub event_type: ScanEventType,
    pub timestamp: SystemTime,
    pub scan_id: String,
    pub state: ScanState,
    pub message: Option<String>,
}

impl ScanEvent {
    pub fn new(event_type: ScanEventType, scan_id: String, state: ScanState) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            scan_id,
            state,
            message: None,
        }
    }

    pub fn with_message(
        event_type: ScanEventType,
        scan_id: String,
        state: ScanState,
        message: String,
    ) -> Self {
        Self {
            message: Some(message),
            ..Self::new(event_type, scan_id, state)
        }
    }

    /// Event describing the move into `state`
    pub fn for_state(scan_id: String, state: ScanState) -> Self {
        let event_type = match state {
            ScanState::Enumerating => ScanEventType::Started,
            ScanState::Done => ScanEventType::Completed,
            ScanState::Canceled => ScanEventType::Terminated,
            _ => ScanEventType::StateChanged,
        };
        Self::new(event_type, scan_id, state)
    }
}

/// Resolution of an out-of-band wait
#[derive(Clone, Debug)]
pub struct InteractionEvent {
    pub event_type: InteractionEventType,
    pub timestamp: SystemTime,
    pub template_id: String,
    pub target: String,
}

impl InteractionEvent {
    pub fn new(event_type: InteractionEventType, template_id: String, target: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            template_id,
            target,
        }
    }

    /// Interaction event carried by an outcome, if it has one
    pub fn from_outcome(record: &OutcomeRecord) -> Option<Self> {
        let event_type = match record.outcome {
            OutcomeKind::InteractionConfirmed => InteractionEventType::Confirmed,
            OutcomeKind::NoInteraction => InteractionEventType::Expired,
            _ => return None,
        };
        Some(Self {
            event_type,
            timestamp: record.timestamp,
            template_id: record.template_id.clone(),
            target: record.target.clone(),
        })
    }
}

/// Unified event enum that encompasses all event types
#[derive(Clone, Debug)]
pub enum Event {
    Scan(ScanEvent),
    Outcome(OutcomeRecord),
    Stats(StatsSnapshot),
    Interaction(InteractionEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Scan(_) => "Scan",
            Event::Outcome(_) => "Outcome",
            Event::Stats(_) => "Stats",
            Event::Interaction(_) => "Interaction",
        }
    }
}

/// Event filtering options for subscribers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventFilter {
    ScanOnly,
    OutcomeOnly,
    StatsOnly,
    InteractionOnly,
    ScanAndStats,
    All,
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &Event) -> bool {
        matches!(
            (self, event),
            (EventFilter::ScanOnly, Event::Scan(_))
                | (EventFilter::OutcomeOnly, Event::Outcome(_))
                | (EventFilter::StatsOnly, Event::Stats(_))
                | (EventFilter::InteractionOnly, Event::Interaction(_))
                | (EventFilter::ScanAndStats, Event::Scan(_))
                | (EventFilter::ScanAndStats, Event::Stats(_))
                | (EventFilter::All, _)
        )
    }
}
