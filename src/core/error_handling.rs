//! Generic error handling utilities
//!
//! Engine errors fall into two groups: configuration mistakes the operator
//! can fix (bad option, option rejected in thread-safe mode, unreadable
//! templates file) and runtime failures that only make sense with debug
//! detail. [`log_error_with_context`] logs each group at the right level.

use std::borrow::Cow;

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if the error carries a message the operator can act on
    ///
    /// Examples: invalid concurrency value, option unsupported in the
    /// current engine mode, malformed config file.
    fn is_user_actionable(&self) -> bool;

    /// The operator-facing message for user-actionable errors
    fn user_message(&self) -> Option<Cow<'_, str>>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use scanmatrix::core::error_handling::log_error_with_context;
/// # use scanmatrix::scheduler::ScanError;
/// let err = ScanError::InvalidConfig {
///     message: "template concurrency must be at least 1".to_string(),
/// };
/// log_error_with_context(&err, "Building scan configuration");
/// // Logs: "FATAL: template concurrency must be at least 1"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
