//! Scan matrix data types

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use strum_macros::{Display, EnumIter, EnumString};

use crate::hosterrors::normalize_host_key;

/// Protocol a template speaks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    Http,
    Dns,
    Network,
    Ssl,
    Websocket,
    Whois,
    Code,
    File,
    Javascript,
    Headless,
}

/// Which pool a template runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum CostClass {
    Lightweight,
    Headless,
}

/// A loaded template; immutable for the lifetime of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub protocol: ProtocolType,
    /// Rate-limit tokens consumed per probe
    pub request_cost: u32,
    /// Whether the template confirms findings out of band
    pub interactions: bool,
}

impl Template {
    pub fn new(id: impl Into<String>, protocol: ProtocolType) -> Self {
        Self {
            id: id.into(),
            protocol,
            request_cost: 1,
            interactions: false,
        }
    }

    pub fn with_request_cost(mut self, cost: u32) -> Self {
        self.request_cost = cost;
        self
    }

    pub fn with_interactions(mut self, interactions: bool) -> Self {
        self.interactions = interactions;
        self
    }

    pub fn cost_class(&self) -> CostClass {
        match self.protocol {
            ProtocolType::Headless => CostClass::Headless,
            _ => CostClass::Lightweight,
        }
    }
}

/// A scan target as supplied, plus its normalised host key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub raw: String,
    pub host_key: String,
}

impl Target {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let host_key = normalize_host_key(&raw);
        Self { raw, host_key }
    }
}

impl From<&str> for Target {
    fn from(raw: &str) -> Self {
        Target::new(raw)
    }
}

/// One cell of the template x target matrix
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub template: Arc<Template>,
    pub target: Arc<Target>,
    /// Position in enumeration order
    pub sequence: usize,
}

impl WorkItem {
    pub fn template_id(&self) -> &str {
        &self.template.id
    }

    pub fn host_key(&self) -> &str {
        &self.target.host_key
    }
}

/// Final result of one work item
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Completed,
    Matched,
    InteractionConfirmed,
    NoInteraction,
    Failed,
    HostSkipped,
    Canceled,
}

/// What the result emitter receives for every finished work item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub template_id: String,
    pub target: String,
    pub host_key: String,
    pub outcome: OutcomeKind,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: SystemTime,
}

impl OutcomeRecord {
    pub fn new(item: &WorkItem, outcome: OutcomeKind, attempts: u32, timestamp: SystemTime) -> Self {
        Self {
            template_id: item.template.id.clone(),
            target: item.target.raw.clone(),
            host_key: item.target.host_key.clone(),
            outcome,
            attempts,
            error: None,
            timestamp,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Point-in-time counters of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub total: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub matched: u64,
    pub interaction_confirmed: u64,
    pub no_interaction: u64,
    pub failed: u64,
    pub host_skipped: u64,
    pub canceled: u64,
}

impl ScanStats {
    /// Work items with a final outcome
    pub fn finished(&self) -> u64 {
        self.completed
            + self.matched
            + self.interaction_confirmed
            + self.no_interaction
            + self.failed
            + self.host_skipped
            + self.canceled
    }

    pub fn count(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Completed => self.completed,
            OutcomeKind::Matched => self.matched,
            OutcomeKind::InteractionConfirmed => self.interaction_confirmed,
            OutcomeKind::NoInteraction => self.no_interaction,
            OutcomeKind::Failed => self.failed,
            OutcomeKind::HostSkipped => self.host_skipped,
            OutcomeKind::Canceled => self.canceled,
        }
    }
}

/// Lock-free counters updated by workers
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    total: AtomicU64,
    dispatched: AtomicU64,
    outcomes: [AtomicU64; 7],
}

impl StatsCounters {
    pub(crate) fn set_total(&self, total: usize) {
        self.total.store(total as u64, Ordering::Relaxed);
    }

    pub(crate) fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, kind: OutcomeKind) {
        self.outcomes[Self::slot(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ScanStats {
        let load = |kind| self.outcomes[Self::slot(kind)].load(Ordering::Relaxed);
        ScanStats {
            total: self.total.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: load(OutcomeKind::Completed),
            matched: load(OutcomeKind::Matched),
            interaction_confirmed: load(OutcomeKind::InteractionConfirmed),
            no_interaction: load(OutcomeKind::NoInteraction),
            failed: load(OutcomeKind::Failed),
            host_skipped: load(OutcomeKind::HostSkipped),
            canceled: load(OutcomeKind::Canceled),
        }
    }

    fn slot(kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Completed => 0,
            OutcomeKind::Matched => 1,
            OutcomeKind::InteractionConfirmed => 2,
            OutcomeKind::NoInteraction => 3,
            OutcomeKind::Failed => 4,
            OutcomeKind::HostSkipped => 5,
            OutcomeKind::Canceled => 6,
        }
    }
}
