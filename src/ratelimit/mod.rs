//! Request admission control
//!
//! A global token bucket bounds the probe rate of the whole scan; an optional
//! per-host bucket additionally bounds the rate towards any single host.
//! Callers wait for tokens, they are never refused. The only way an
//! [`RateLimiter::acquire`] call fails is cancellation.
//!
//! ```rust,no_run
//! use scanmatrix::ratelimit::{RateLimitConfig, RateLimiter};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), scanmatrix::ratelimit::RateLimitError> {
//! let limiter = RateLimiter::new(
//!     Some(RateLimitConfig::new(150, Duration::from_secs(1))),
//!     None,
//!     10_000,
//! );
//! let cancel = CancellationToken::new();
//! limiter.acquire(Some("example.com:443"), 1, &cancel).await?;
//! # Ok(())
//! # }
//! ```

mod bucket;
mod error;
mod limiter;

pub use bucket::TokenBucket;
pub use error::RateLimitError;
pub use limiter::{RateLimitConfig, RateLimiter};

/// Default global budget: 150 tokens per second
pub const DEFAULT_RATE_LIMIT: u32 = 150;
