//! Scan run lifecycle

use serde::Serialize;
use strum_macros::Display;
use tokio::sync::watch;

use super::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Enumerating,
    Dispatching,
    Draining,
    Done,
    Canceled,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Done | ScanState::Canceled)
    }

    pub fn can_transition_to(self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Idle, Enumerating)
                | (Enumerating, Dispatching)
                | (Dispatching, Draining)
                | (Draining, Done)
                | (Dispatching, Canceled)
                | (Draining, Canceled)
        )
    }
}

/// Current state of one run, published on a watch channel
#[derive(Debug)]
pub(crate) struct StateMachine {
    sender: watch::Sender<ScanState>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(ScanState::Idle);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.sender.subscribe()
    }

    pub(crate) fn current(&self) -> ScanState {
        *self.sender.borrow()
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow
    pub(crate) fn advance(&self, next: ScanState) -> Result<(), ScanError> {
        let mut result = Ok(());
        self.sender.send_if_modified(|state| {
            if state.can_transition_to(next) {
                log::debug!("Scan state {} -> {}", state, next);
                *state = next;
                true
            } else {
                result = Err(ScanError::IllegalTransition {
                    from: *state,
                    to: next,
                });
                false
            }
        });
        result
    }
}
