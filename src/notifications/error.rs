//! Event bus errors

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Subscribers whose receiving half was gone; they have been removed
    ClosedSubscribers {
        event_kind: String,
        subscribers: Vec<String>,
    },
    /// Too many undelivered events across all subscribers
    Backlog {
        pending: Vec<(String, usize)>,
        total: usize,
    },
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::ClosedSubscribers {
                event_kind,
                subscribers,
            } => write!(
                f,
                "{} event not delivered to closed subscribers: {}",
                event_kind,
                subscribers.join(", ")
            ),
            NotificationError::Backlog { pending, total } => {
                let worst = pending.iter().max_by_key(|(_, n)| *n);
                write!(f, "{} undelivered events", total)?;
                if let Some((id, n)) = worst {
                    write!(f, " ({} queued for '{}')", n, id)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for NotificationError {}

impl crate::core::error_handling::ContextualError for NotificationError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<Cow<'_, str>> {
        None
    }
}
