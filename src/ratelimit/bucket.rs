//! Continuously refilling token bucket

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::error::RateLimitError;

// Float slack so a refill of 0.9999999 tokens still admits a cost of 1
const EPSILON: f64 = 1e-9;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilling at `capacity / interval` tokens per second
///
/// Waiters queue on a fair async mutex and the head of the queue keeps the
/// lock while it sleeps, so grants are handed out in arrival order.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket of `capacity` tokens, refilled over `interval`
    ///
    /// Zero values are clamped to one token and one millisecond;
    /// configuration validation rejects them before they get here.
    pub fn new(capacity: u32, interval: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let interval = interval.max(Duration::from_millis(1));
        Self {
            capacity,
            refill_per_sec: capacity / interval.as_secs_f64(),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Tokens currently available, after refill
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    /// Wait until `cost` tokens can be taken
    ///
    /// A cost above the capacity is clamped to the capacity.
    pub async fn acquire(&self, cost: u32, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        if cost == 0 {
            return Ok(());
        }
        let cost = f64::from(cost).min(self.capacity);

        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Canceled),
            state = self.state.lock() => state,
        };

        loop {
            self.refill(&mut state);
            if state.tokens + EPSILON >= cost {
                state.tokens = (state.tokens - cost).max(0.0);
                return Ok(());
            }

            let deficit = cost - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.refill_per_sec);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RateLimitError::Canceled),
                _ = sleep(wait) => {}
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}
