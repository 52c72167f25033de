//! Global and per-host admission

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use tokio_util::sync::CancellationToken;

use super::bucket::TokenBucket;
use super::error::RateLimitError;
use crate::core::sync::lock_or_recover;

/// `max_tokens` granted per `interval`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_tokens: u32,
    pub interval: Duration,
}

impl RateLimitConfig {
    pub fn new(max_tokens: u32, interval: Duration) -> Self {
        Self {
            max_tokens,
            interval,
        }
    }

    pub fn per_second(max_tokens: u32) -> Self {
        Self::new(max_tokens, Duration::from_secs(1))
    }
}

/// Shared admission gate for every worker of a scan
#[derive(Debug)]
pub struct RateLimiter {
    global: Option<TokenBucket>,
    per_host: Option<RateLimitConfig>,
    max_hosts: NonZeroUsize,
    host_buckets: Mutex<LruCache<String, Arc<TokenBucket>>>,
}

impl RateLimiter {
    /// Build a limiter; `None` for `global` means unlimited
    ///
    /// Per-host buckets are created lazily. Idle buckets beyond `max_hosts`
    /// are evicted least recently used first; a bucket with a waiter is kept
    /// even when that takes the map past `max_hosts`.
    pub fn new(
        global: Option<RateLimitConfig>,
        per_host: Option<RateLimitConfig>,
        max_hosts: usize,
    ) -> Self {
        let max_hosts = NonZeroUsize::new(max_hosts).unwrap_or(NonZeroUsize::MIN);
        Self {
            global: global.map(|config| TokenBucket::new(config.max_tokens, config.interval)),
            per_host,
            max_hosts,
            host_buckets: Mutex::new(LruCache::new(max_hosts)),
        }
    }

    /// A limiter that admits everything immediately
    pub fn unlimited() -> Self {
        Self::new(None, None, 1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.global.is_none() && self.per_host.is_none()
    }

    /// Wait until `cost` tokens are granted by every applicable bucket
    ///
    /// The host bucket is consulted first so a throttled host does not burn
    /// global budget while it waits.
    pub async fn acquire(
        &self,
        host_key: Option<&str>,
        cost: u32,
        cancel: &CancellationToken,
    ) -> Result<(), RateLimitError> {
        if cancel.is_cancelled() {
            return Err(RateLimitError::Canceled);
        }

        if let Some(bucket) = host_key.and_then(|key| self.host_bucket(key)) {
            bucket.acquire(cost, cancel).await?;
        }
        if let Some(global) = &self.global {
            global.acquire(cost, cancel).await?;
        }
        Ok(())
    }

    /// Number of per-host buckets currently tracked
    pub fn tracked_hosts(&self) -> usize {
        lock_or_recover(&self.host_buckets, "rate limiter").len()
    }

    fn host_bucket(&self, host_key: &str) -> Option<Arc<TokenBucket>> {
        let config = self.per_host?;
        let mut buckets = lock_or_recover(&self.host_buckets, "rate limiter");
        if !buckets.contains(host_key) {
            self.make_room(&mut buckets);
        }
        let bucket = buckets.get_or_insert(host_key.to_string(), || {
            Arc::new(TokenBucket::new(config.max_tokens, config.interval))
        });
        Some(Arc::clone(bucket))
    }

    // Only idle buckets are evicted. Handles are cloned under the map lock,
    // so a strong count of one is stable here.
    fn make_room(&self, buckets: &mut LruCache<String, Arc<TokenBucket>>) {
        let max_hosts = self.max_hosts.get();
        while buckets.len() >= max_hosts {
            match buckets.peek_lru() {
                Some((_, bucket)) if Arc::strong_count(bucket) == 1 => {
                    buckets.pop_lru();
                }
                _ => break,
            }
        }

        let wanted = (buckets.len() + 1).max(max_hosts);
        if let Some(capacity) = NonZeroUsize::new(wanted) {
            if capacity != buckets.cap() {
                log::trace!("Resizing per-host rate buckets to {}", capacity);
                buckets.resize(capacity);
            }
        }
    }
}
