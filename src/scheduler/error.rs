//! Scan engine error types

use std::borrow::Cow;

use super::config::EngineMode;
use super::state::ScanState;
use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("Unknown scan strategy '{name}' (expected auto, host-spray or template-spray)")]
    UnknownStrategy { name: String },

    #[error("Invalid scan configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Option {option} is not supported in {mode} mode")]
    UnsupportedInMode {
        option: &'static str,
        mode: EngineMode,
    },

    #[error("Scan engine has no executor")]
    MissingExecutor,

    #[error("Illegal scan state transition {from} -> {to}")]
    IllegalTransition { from: ScanState, to: ScanState },

    #[error("Scan task failed: {message}")]
    TaskFailed { message: String },
}

impl ScanError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ScanError::InvalidConfig {
            message: message.into(),
        }
    }
}

impl ContextualError for ScanError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            ScanError::UnknownStrategy { .. }
                | ScanError::InvalidConfig { .. }
                | ScanError::UnsupportedInMode { .. }
                | ScanError::MissingExecutor
        )
    }

    fn user_message(&self) -> Option<Cow<'_, str>> {
        match self {
            ScanError::InvalidConfig { message } => Some(Cow::Borrowed(message)),
            ScanError::UnknownStrategy { .. }
            | ScanError::UnsupportedInMode { .. }
            | ScanError::MissingExecutor => Some(Cow::Owned(self.to_string())),
            _ => None,
        }
    }
}
