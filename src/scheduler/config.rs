//! Scan configuration
//!
//! [`ScanConfigBuilder`] collects options and validates them all at once in
//! [`ScanConfigBuilder::build`]. The resulting [`ScanConfig`] is immutable;
//! the engine shares it behind an `Arc`.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::error::ScanError;
use crate::hosterrors::{HostErrorConfig, DEFAULT_MAX_HOSTS_COUNT, DEFAULT_MAX_HOST_ERROR};
use crate::interactions::CorrelatorConfig;
use crate::ratelimit::{RateLimitConfig, DEFAULT_RATE_LIMIT};

pub const DEFAULT_TEMPLATE_CONCURRENCY: usize = 25;
pub const DEFAULT_HOST_CONCURRENCY: usize = 25;
pub const DEFAULT_HEADLESS_TEMPLATE_CONCURRENCY: usize = 10;
pub const DEFAULT_HEADLESS_HOST_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_AUTO_CROSSOVER_RATIO: f64 = 1.0;

/// Loop order over the template x target matrix
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    #[default]
    Auto,
    /// Templates outside, targets inside
    HostSpray,
    /// Targets outside, templates inside
    TemplateSpray,
}

impl ScanStrategy {
    pub fn parse(name: &str) -> Result<Self, ScanError> {
        ScanStrategy::from_str(name.trim()).map_err(|_| ScanError::UnknownStrategy {
            name: name.to_string(),
        })
    }
}

/// Capability tag deciding which options an engine accepts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum EngineMode {
    #[default]
    Standard,
    /// Embedded engine shared between callers; process-wide knobs are off limits
    ThreadSafe,
}

/// The four pool sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency {
    pub template: usize,
    pub host: usize,
    pub headless_template: usize,
    pub headless_host: usize,
}

impl Default for Concurrency {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE_CONCURRENCY,
            host: DEFAULT_HOST_CONCURRENCY,
            headless_template: DEFAULT_HEADLESS_TEMPLATE_CONCURRENCY,
            headless_host: DEFAULT_HEADLESS_HOST_CONCURRENCY,
        }
    }
}

/// Per-request and per-host network behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub max_host_error: u32,
    pub track_errors: Vec<String>,
    pub disable_max_host_error: bool,
    pub max_tracked_hosts: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            max_host_error: DEFAULT_MAX_HOST_ERROR,
            track_errors: Vec::new(),
            disable_max_host_error: false,
            max_tracked_hosts: DEFAULT_MAX_HOSTS_COUNT,
        }
    }
}

/// Validated, immutable options of one engine
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    strategy: ScanStrategy,
    auto_crossover_ratio: f64,
    concurrency: Concurrency,
    rate_limit: Option<RateLimitConfig>,
    per_host_rate_limit: Option<RateLimitConfig>,
    network: NetworkConfig,
    interactions: Option<CorrelatorConfig>,
    stats_interval: Option<Duration>,
    verbose: bool,
    mode: EngineMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: ScanStrategy::Auto,
            auto_crossover_ratio: DEFAULT_AUTO_CROSSOVER_RATIO,
            concurrency: Concurrency::default(),
            rate_limit: Some(RateLimitConfig::per_second(DEFAULT_RATE_LIMIT)),
            per_host_rate_limit: None,
            network: NetworkConfig::default(),
            interactions: None,
            stats_interval: None,
            verbose: false,
            mode: EngineMode::Standard,
        }
    }
}

impl ScanConfig {
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    pub fn auto_crossover_ratio(&self) -> f64 {
        self.auto_crossover_ratio
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    pub fn rate_limit(&self) -> Option<RateLimitConfig> {
        self.rate_limit
    }

    pub fn per_host_rate_limit(&self) -> Option<RateLimitConfig> {
        self.per_host_rate_limit
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn timeout(&self) -> Duration {
        self.network.timeout
    }

    pub fn retries(&self) -> u32 {
        self.network.retries
    }

    pub fn host_errors(&self) -> HostErrorConfig {
        HostErrorConfig {
            threshold: self.network.max_host_error,
            tracked_kinds: self.network.track_errors.clone(),
            max_hosts: self.network.max_tracked_hosts,
            disabled: self.network.disable_max_host_error,
        }
    }

    pub fn interactions(&self) -> Option<CorrelatorConfig> {
        self.interactions
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        self.stats_interval
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }
}

/// Collects scan options; nothing is checked until [`build`](Self::build)
#[derive(Debug, Clone, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
    strategy_name: Option<String>,
    /// Options that thread-safe mode refuses, in the order they were set
    restricted: Vec<&'static str>,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: ScanStrategy) -> Self {
        self.config.strategy = strategy;
        self.strategy_name = None;
        self
    }

    /// Strategy by name; an unknown name fails at build time
    pub fn strategy_name(mut self, name: impl Into<String>) -> Self {
        self.strategy_name = Some(name.into());
        self
    }

    /// Host count / template count above which `auto` picks template-spray
    pub fn auto_crossover_ratio(mut self, ratio: f64) -> Self {
        self.config.auto_crossover_ratio = ratio;
        self
    }

    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn template_concurrency(mut self, value: usize) -> Self {
        self.config.concurrency.template = value;
        self
    }

    pub fn host_concurrency(mut self, value: usize) -> Self {
        self.config.concurrency.host = value;
        self
    }

    pub fn headless_template_concurrency(mut self, value: usize) -> Self {
        self.config.concurrency.headless_template = value;
        self
    }

    pub fn headless_host_concurrency(mut self, value: usize) -> Self {
        self.config.concurrency.headless_host = value;
        self
    }

    /// `max_tokens` probes per `interval` across all hosts
    pub fn global_rate_limit(mut self, max_tokens: u32, interval: Duration) -> Self {
        self.config.rate_limit = Some(RateLimitConfig::new(max_tokens, interval));
        self
    }

    pub fn unlimited_rate(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    pub fn per_host_rate_limit(mut self, max_tokens: u32, interval: Duration) -> Self {
        self.config.per_host_rate_limit = Some(RateLimitConfig::new(max_tokens, interval));
        self.restrict("per_host_rate_limit")
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.config.network = network;
        self.restrict("network")
    }

    pub fn interactions(mut self, interactions: CorrelatorConfig) -> Self {
        self.config.interactions = Some(interactions);
        self.restrict("interactions")
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.config.stats_interval = Some(interval);
        self.restrict("stats")
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self.restrict("verbosity")
    }

    pub fn mode(mut self, mode: EngineMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Validate every option and freeze the configuration
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let mut config = self.config;

        if let Some(name) = self.strategy_name.as_deref() {
            config.strategy = ScanStrategy::parse(name)?;
        }

        if config.mode == EngineMode::ThreadSafe {
            if let Some(&option) = self.restricted.first() {
                return Err(ScanError::UnsupportedInMode {
                    option,
                    mode: config.mode,
                });
            }
        }

        let pools = [
            ("template concurrency", config.concurrency.template),
            ("host concurrency", config.concurrency.host),
            (
                "headless template concurrency",
                config.concurrency.headless_template,
            ),
            ("headless host concurrency", config.concurrency.headless_host),
        ];
        for (name, size) in pools {
            if size == 0 {
                return Err(ScanError::invalid(format!("{} must be at least 1", name)));
            }
        }

        for (name, limit) in [
            ("rate limit", config.rate_limit),
            ("per-host rate limit", config.per_host_rate_limit),
        ] {
            if let Some(limit) = limit {
                if limit.max_tokens == 0 {
                    return Err(ScanError::invalid(format!(
                        "{} must allow at least 1 token",
                        name
                    )));
                }
                if limit.interval.is_zero() {
                    return Err(ScanError::invalid(format!(
                        "{} interval must be greater than zero",
                        name
                    )));
                }
            }
        }

        if config.network.timeout.is_zero() {
            return Err(ScanError::invalid("timeout must be greater than zero"));
        }
        if config.network.max_tracked_hosts == 0 {
            return Err(ScanError::invalid("max tracked hosts must be at least 1"));
        }

        if let Some(interactions) = config.interactions {
            if interactions.poll_interval.is_zero() {
                return Err(ScanError::invalid(
                    "interaction poll interval must be greater than zero",
                ));
            }
            if interactions.token_timeout.is_zero() {
                return Err(ScanError::invalid(
                    "interaction token timeout must be greater than zero",
                ));
            }
        }

        if config.stats_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ScanError::invalid("stats interval must be greater than zero"));
        }

        if !(config.auto_crossover_ratio.is_finite() && config.auto_crossover_ratio > 0.0) {
            return Err(ScanError::invalid(
                "auto crossover ratio must be a positive number",
            ));
        }

        Ok(config)
    }

    fn restrict(mut self, option: &'static str) -> Self {
        if !self.restricted.contains(&option) {
            self.restricted.push(option);
        }
        self
    }
}
