//! Per-host consecutive failure tracking

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use lru::LruCache;

use crate::core::sync::lock_or_recover;

/// Upper bound on the number of hosts tracked at once
pub const DEFAULT_MAX_HOSTS_COUNT: usize = 10_000;

/// Consecutive failures after which a host is skipped
pub const DEFAULT_MAX_HOST_ERROR: u32 = 30;

/// Kind recorded when a failure carries no classification
const UNCLASSIFIED_KIND: &str = "unclassified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostErrorConfig {
    /// Failures before the circuit opens; 0 never opens it
    pub threshold: u32,
    /// Error kinds that count; empty counts every failure
    pub tracked_kinds: Vec<String>,
    pub max_hosts: usize,
    pub disabled: bool,
}

impl Default for HostErrorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MAX_HOST_ERROR,
            tracked_kinds: Vec::new(),
            max_hosts: DEFAULT_MAX_HOSTS_COUNT,
            disabled: false,
        }
    }
}

impl HostErrorConfig {
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

/// Failure history of one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostErrorRecord {
    pub consecutive_errors: u32,
    /// Counted failures in the current streak, by kind
    pub tracked_error_kinds: HashMap<String, u32>,
    trip_logged: bool,
}

/// Circuit breaker shared by every worker of a scan
#[derive(Debug)]
pub struct HostErrorCache {
    threshold: u32,
    tracked_kinds: Vec<String>,
    disabled: AtomicBool,
    records: Mutex<LruCache<String, HostErrorRecord>>,
}

impl Default for HostErrorCache {
    fn default() -> Self {
        Self::new(HostErrorConfig::default())
    }
}

impl HostErrorCache {
    pub fn new(config: HostErrorConfig) -> Self {
        Self {
            threshold: config.threshold,
            tracked_kinds: config
                .tracked_kinds
                .iter()
                .map(|kind| kind.to_ascii_lowercase())
                .collect(),
            disabled: AtomicBool::new(config.disabled),
            records: Mutex::new(LruCache::new(
                NonZeroUsize::new(config.max_hosts).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record the outcome of one probe against `host_key`
    ///
    /// A success clears the streak. A failure extends it when its kind is
    /// tracked; the record is created on the first counted failure.
    pub fn record_result(&self, host_key: &str, success: bool, error_kind: Option<&str>) {
        let mut records = lock_or_recover(&self.records, "host error cache");

        if success {
            if let Some(record) = records.get_mut(host_key) {
                record.consecutive_errors = 0;
                record.tracked_error_kinds.clear();
                record.trip_logged = false;
            }
            return;
        }

        if !self.counts(error_kind) {
            log::trace!(
                "Ignoring untracked failure kind {:?} for {}",
                error_kind,
                host_key
            );
            return;
        }

        let record = records.get_or_insert_mut(host_key.to_string(), HostErrorRecord::default);
        record.consecutive_errors = record.consecutive_errors.saturating_add(1);
        let kind = error_kind
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| UNCLASSIFIED_KIND.to_string());
        *record.tracked_error_kinds.entry(kind).or_insert(0) += 1;

        if self.threshold > 0 && record.consecutive_errors >= self.threshold && !record.trip_logged
        {
            record.trip_logged = true;
            log::warn!(
                "Skipping {} after {} consecutive errors",
                host_key,
                record.consecutive_errors
            );
        }
    }

    /// True when the circuit for `host_key` is open
    ///
    /// Looking a host up counts as use for eviction purposes.
    pub fn should_skip(&self, host_key: &str) -> bool {
        if self.threshold == 0 || self.is_disabled() {
            return false;
        }
        let mut records = lock_or_recover(&self.records, "host error cache");
        records
            .get(host_key)
            .is_some_and(|record| record.consecutive_errors >= self.threshold)
    }

    /// Forget everything known about `host_key`
    pub fn reset(&self, host_key: &str) {
        lock_or_recover(&self.records, "host error cache").pop(host_key);
    }

    /// Stop skipping hosts; failures are still recorded
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn tracked_hosts(&self) -> usize {
        lock_or_recover(&self.records, "host error cache").len()
    }

    /// Copy of the record for `host_key` without touching its recency
    pub fn record(&self, host_key: &str) -> Option<HostErrorRecord> {
        lock_or_recover(&self.records, "host error cache")
            .peek(host_key)
            .cloned()
    }

    fn counts(&self, error_kind: Option<&str>) -> bool {
        if self.tracked_kinds.is_empty() {
            return true;
        }
        error_kind.is_some_and(|kind| {
            self.tracked_kinds
                .iter()
                .any(|tracked| tracked.eq_ignore_ascii_case(kind))
        })
    }
}
