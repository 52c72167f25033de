//! TOML configuration file parsing and loading
//!
//! Keys are kebab-case and match the long command line options. A value
//! from the file only applies when the same option was not given on the
//! command line.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use super::args::{Args, ScanArgs};
use crate::core::error_handling::ContextualError;
use crate::core::validation::{
    parse_positive_duration, validate_count, validate_positive_int, validate_ratio,
};
use crate::interactions::CorrelatorConfig;
use crate::scheduler::{EngineMode, NetworkConfig, ScanConfig, ScanError};

const CONFIG_DIR_NAME: &str = "Scanmatrix";
const CONFIG_FILE_NAME: &str = "scanmatrix.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ConfigError::Scan(e) => e.is_user_actionable(),
            _ => true,
        }
    }

    fn user_message(&self) -> Option<Cow<'_, str>> {
        match self {
            ConfigError::Scan(e) => e.user_message(),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Default configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Read the configuration file into a raw table
///
/// An explicitly named file must exist; the default file is optional.
pub async fn load_config_file(
    config_file: Option<&Path>,
) -> Result<Option<(PathBuf, toml::Table)>, ConfigError> {
    let path = match config_file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };

    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
    let table = toml::from_str::<toml::Table>(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(Some((path, table)))
}

impl Args {
    /// Apply TOML configuration values to options not set on the command line
    pub fn apply_toml_values(&mut self, config: &toml::Table) -> Result<(), ConfigError> {
        if !self.color && !self.no_color {
            if let Some(color) = bool_value(config, "color")? {
                self.color = color;
                self.no_color = !color;
            }
        }
        fill(&mut self.log_level, string_value(config, "log-level")?);
        fill(&mut self.log_format, string_value(config, "log-format")?);
        if self.log_file.is_none() {
            if let Some(log_file) = string_value(config, "log-file")? {
                // Magic values "none" and "-" disable file logging
                if !(log_file.eq_ignore_ascii_case("none") || log_file == "-") {
                    self.log_file = Some(PathBuf::from(log_file));
                }
            }
        }

        self.scan.apply_toml_values(config)
    }
}

impl ScanArgs {
    fn apply_toml_values(&mut self, config: &toml::Table) -> Result<(), ConfigError> {
        fill(&mut self.strategy, string_value(config, "scan-strategy")?);
        fill(&mut self.mode, string_value(config, "mode")?);
        fill(
            &mut self.auto_crossover_ratio,
            parsed_value(config, "auto-crossover-ratio", validate_ratio)?,
        );

        for (key, target) in [
            ("template-concurrency", &mut self.template_concurrency),
            ("host-concurrency", &mut self.host_concurrency),
            (
                "headless-template-concurrency",
                &mut self.headless_template_concurrency,
            ),
            (
                "headless-host-concurrency",
                &mut self.headless_host_concurrency,
            ),
            ("max-tracked-hosts", &mut self.max_tracked_hosts),
        ] {
            fill(target, parsed_value(config, key, validate_positive_int)?);
        }

        for (key, target) in [
            ("per-host-rate-limit", &mut self.per_host_rate_limit),
            ("retries", &mut self.retries),
            ("max-host-error", &mut self.max_host_error),
        ] {
            fill(target, parsed_value(config, key, validate_count)?);
        }

        if self.rate_limit.is_none() && !self.no_rate_limit {
            match parsed_value(config, "rate-limit", validate_count)? {
                Some(0) => self.no_rate_limit = true,
                other => self.rate_limit = other,
            }
        }

        for (key, target) in [
            ("rate-limit-duration", &mut self.rate_limit_duration),
            ("timeout", &mut self.timeout),
            ("stats-interval", &mut self.stats_interval),
            (
                "interactions-poll-interval",
                &mut self.interactions_poll_interval,
            ),
            ("interactions-eviction", &mut self.interactions_eviction),
            ("interactions-cooldown", &mut self.interactions_cooldown),
        ] {
            fill(target, duration_value(config, key)?);
        }

        if self.track_error.is_empty() {
            self.track_error = string_array_value(config, "track-error")?;
        }
        if !self.no_max_host_error {
            self.no_max_host_error = bool_value(config, "no-max-host-error")?.unwrap_or(false);
        }
        if !self.interactions {
            self.interactions = bool_value(config, "interactions")?.unwrap_or(false);
        }
        if !self.verbose {
            self.verbose = bool_value(config, "verbose")?.unwrap_or(false);
        }
        Ok(())
    }

    fn network_overridden(&self) -> bool {
        self.timeout.is_some()
            || self.retries.is_some()
            || self.max_host_error.is_some()
            || !self.track_error.is_empty()
            || self.no_max_host_error
            || self.max_tracked_hosts.is_some()
    }

    fn interactions_enabled(&self) -> bool {
        self.interactions
            || self.interactions_poll_interval.is_some()
            || self.interactions_eviction.is_some()
            || self.interactions_cooldown.is_some()
    }

    /// Build the engine configuration from the merged options
    ///
    /// Options left unset keep the engine defaults and are not passed to the
    /// builder, so a thread-safe configuration only fails on options that
    /// were actually requested.
    pub fn scan_config(&self) -> Result<ScanConfig, ConfigError> {
        let mut builder = ScanConfig::builder();

        if let Some(name) = self.strategy.as_deref() {
            builder = builder.strategy_name(name);
        }
        if let Some(mode) = self.mode.as_deref() {
            let mode = mode
                .parse::<EngineMode>()
                .map_err(|_| invalid("mode", format!("unknown engine mode '{}'", mode)))?;
            builder = builder.mode(mode);
        }
        if let Some(ratio) = self.auto_crossover_ratio {
            builder = builder.auto_crossover_ratio(ratio);
        }
        if let Some(value) = self.template_concurrency {
            builder = builder.template_concurrency(value);
        }
        if let Some(value) = self.host_concurrency {
            builder = builder.host_concurrency(value);
        }
        if let Some(value) = self.headless_template_concurrency {
            builder = builder.headless_template_concurrency(value);
        }
        if let Some(value) = self.headless_host_concurrency {
            builder = builder.headless_host_concurrency(value);
        }

        let window = self.rate_limit_duration.unwrap_or(Duration::from_secs(1));
        if self.no_rate_limit {
            builder = builder.unlimited_rate();
        } else if let Some(max_tokens) = self.rate_limit {
            builder = builder.global_rate_limit(max_tokens, window);
        }
        if let Some(max_tokens) = self.per_host_rate_limit {
            builder = builder.per_host_rate_limit(max_tokens, window);
        }

        if self.network_overridden() {
            let defaults = NetworkConfig::default();
            builder = builder.network(NetworkConfig {
                timeout: self.timeout.unwrap_or(defaults.timeout),
                retries: self.retries.unwrap_or(defaults.retries),
                max_host_error: self.max_host_error.unwrap_or(defaults.max_host_error),
                track_errors: self.track_error.clone(),
                disable_max_host_error: self.no_max_host_error,
                max_tracked_hosts: self.max_tracked_hosts.unwrap_or(defaults.max_tracked_hosts),
            });
        }

        if self.interactions_enabled() {
            let defaults = CorrelatorConfig::default();
            builder = builder.interactions(CorrelatorConfig {
                poll_interval: self
                    .interactions_poll_interval
                    .unwrap_or(defaults.poll_interval),
                token_timeout: self.interactions_eviction.unwrap_or(defaults.token_timeout),
                cooldown: self.interactions_cooldown.unwrap_or(defaults.cooldown),
            });
        }

        if let Some(interval) = self.stats_interval {
            builder = builder.stats_interval(interval);
        }
        if self.verbose {
            builder = builder.verbose(true);
        }

        Ok(builder.build()?)
    }
}

fn fill<T>(target: &mut Option<T>, value: Option<T>) {
    if target.is_none() {
        *target = value;
    }
}

fn string_value(config: &toml::Table, key: &str) -> Result<Option<String>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid(key, "expected a string")),
    }
}

fn bool_value(config: &toml::Table, key: &str) -> Result<Option<bool>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected true or false")),
    }
}

/// Integer or string value run through the same validator as the CLI flag
fn parsed_value<T>(
    config: &toml::Table,
    key: &str,
    validate: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    let text = match config.get(key) {
        None => return Ok(None),
        Some(toml::Value::Integer(n)) => n.to_string(),
        Some(toml::Value::Float(f)) => f.to_string(),
        Some(toml::Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid(key, "expected a number")),
    };
    validate(&text).map(Some).map_err(|message| invalid(key, message))
}

/// Duration as a string (`"500ms"`, `"10s"`) or an integer number of seconds
fn duration_value(config: &toml::Table, key: &str) -> Result<Option<Duration>, ConfigError> {
    let text = match config.get(key) {
        None => return Ok(None),
        Some(toml::Value::Integer(n)) => n.to_string(),
        Some(toml::Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid(key, "expected a duration such as \"10s\"")),
    };
    parse_positive_duration(&text)
        .map(Some)
        .map_err(|message| invalid(key, message))
}

/// Single string, comma-separated string or array of strings
fn string_array_value(config: &toml::Table, key: &str) -> Result<Vec<String>, ConfigError> {
    let raw: Vec<&str> = match config.get(key) {
        None => return Ok(Vec::new()),
        Some(toml::Value::String(s)) => vec![s.as_str()],
        Some(toml::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| invalid(key, "expected an array of strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(invalid(key, "expected a string or an array of strings")),
    };

    let mut values: Vec<String> = Vec::new();
    for part in raw.iter().flat_map(|s| s.split(',')) {
        let part = part.trim();
        if !part.is_empty() && !values.iter().any(|v| v == part) {
            values.push(part.to_string());
        }
    }
    Ok(values)
}
