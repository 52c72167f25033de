//! Synchronisation utilities for robust mutex handling
//!
//! Engine components keep their state behind `std::sync::Mutex` and never
//! surface lock failures to callers. A poisoned lock only means some other
//! worker panicked mid-update; the guarded data is a cache or a counter
//! table, so we log and keep going with whatever state is there.

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if the mutex was poisoned
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use scanmatrix::core::sync::lock_or_recover;
///
/// let counter = Mutex::new(41);
/// *lock_or_recover(&counter, "counter") += 1;
/// assert_eq!(*counter.lock().unwrap(), 42);
/// ```
pub fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, component: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!(
            "{}: recovering poisoned lock (a worker panicked while holding it)",
            component
        );
        poisoned.into_inner()
    })
}
