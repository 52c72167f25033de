//! Rate limiter error types

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit wait canceled")]
    Canceled,
}
