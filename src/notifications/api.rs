//! Public API for the notification system
//!
//! External modules should import from here rather than directly from
//! internal modules.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use crate::core::sync::lock_or_recover;

// Core event types and enums
pub use crate::notifications::event::{
    Event, EventFilter, InteractionEvent, InteractionEventType, ScanEvent, ScanEventType,
};

// Manager and utilities
pub use crate::notifications::bridge::BusEmitter;
pub use crate::notifications::error::NotificationError;
pub use crate::notifications::manager::{run_subscriber, EventReceiver, NotificationManager};

// Traits and statistics
pub use crate::notifications::traits::{Subscriber, SubscriberStatistics};

/// Global notification service instance
static NOTIFICATION_SERVICE: LazyLock<Arc<Mutex<NotificationManager>>> = LazyLock::new(|| {
    log::trace!("Initializing notification service");
    Arc::new(Mutex::new(NotificationManager::new()))
});

/// Access notification service
///
/// Returns a guard over the global notification service that can be used
/// to publish events and manage subscribers. Do not hold it across an
/// `.await`.
///
/// # Examples
/// ```no_run
/// # use scanmatrix::notifications::api::{get_notification_service, EventFilter};
/// let mut receiver = get_notification_service().subscribe(
///     "progress".to_string(),
///     EventFilter::ScanAndStats,
///     "app:progress".to_string(),
/// );
/// ```
pub fn get_notification_service() -> MutexGuard<'static, NotificationManager> {
    let service: &'static Mutex<NotificationManager> = &NOTIFICATION_SERVICE;
    lock_or_recover(service, "notifications")
}

/// Bridge publishing one scan's callbacks onto the global service
pub fn global_emitter(scan_id: impl Into<String>) -> BusEmitter {
    BusEmitter::new(Arc::clone(&NOTIFICATION_SERVICE), scan_id)
}
