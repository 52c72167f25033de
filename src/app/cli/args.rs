//! Core CLI arguments structure
//!
//! Every option is optional on the command line so that values from the
//! configuration file can fill whatever the user did not pass explicitly.

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::logging::{LogFormat, LogSettings};
use crate::core::validation::{
    parse_positive_duration, validate_count, validate_positive_int, validate_ratio,
};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scanmatrix")]
#[command(about = "Template x target scan scheduling toolkit")]
#[command(version)]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Force coloured log output
    #[arg(long = "color", conflicts_with = "no_color", global = true)]
    pub color: bool,

    /// Disable coloured log output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", global = true,
          value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", global = true,
          value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    #[command(flatten)]
    pub scan: ScanArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options that end up in the engine's scan configuration
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Matrix walk order (auto, host-spray, template-spray)
    #[arg(short = 's', long = "scan-strategy", value_name = "NAME", global = true)]
    pub strategy: Option<String>,

    /// Hosts per template above which auto picks template-spray
    #[arg(long = "auto-crossover-ratio", value_name = "RATIO", global = true,
          value_parser = validate_ratio)]
    pub auto_crossover_ratio: Option<f64>,

    /// Templates (or hosts, under template-spray) processed in parallel
    #[arg(short = 't', long = "template-concurrency", value_name = "COUNT", global = true,
          value_parser = validate_positive_int)]
    pub template_concurrency: Option<usize>,

    /// Hosts processed in parallel per template
    #[arg(short = 'b', long = "host-concurrency", value_name = "COUNT", global = true,
          value_parser = validate_positive_int)]
    pub host_concurrency: Option<usize>,

    /// Headless templates processed in parallel
    #[arg(long = "headless-template-concurrency", value_name = "COUNT", global = true,
          value_parser = validate_positive_int)]
    pub headless_template_concurrency: Option<usize>,

    /// Hosts processed in parallel per headless template
    #[arg(long = "headless-host-concurrency", value_name = "COUNT", global = true,
          value_parser = validate_positive_int)]
    pub headless_host_concurrency: Option<usize>,

    /// Maximum probes per rate-limit window across all hosts
    #[arg(short = 'r', long = "rate-limit", value_name = "COUNT", global = true,
          value_parser = validate_count)]
    pub rate_limit: Option<u32>,

    /// Length of the rate-limit window (default 1s)
    #[arg(long = "rate-limit-duration", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub rate_limit_duration: Option<Duration>,

    /// Disable the global rate limit
    #[arg(long = "no-rate-limit", conflicts_with = "rate_limit", global = true)]
    pub no_rate_limit: bool,

    /// Maximum probes per rate-limit window to any single host
    #[arg(long = "per-host-rate-limit", value_name = "COUNT", global = true,
          value_parser = validate_count)]
    pub per_host_rate_limit: Option<u32>,

    /// Time allowed for a single probe
    #[arg(long = "timeout", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub timeout: Option<Duration>,

    /// Retries after a transient failure
    #[arg(long = "retries", value_name = "COUNT", global = true, value_parser = validate_count)]
    pub retries: Option<u32>,

    /// Failures before a host is skipped (0 never skips)
    #[arg(long = "max-host-error", value_name = "COUNT", global = true,
          value_parser = validate_count)]
    pub max_host_error: Option<u32>,

    /// Error kinds that count towards the host limit*
    #[arg(long = "track-error", value_name = "KINDS", global = true,
          value_delimiter = ',', action = ArgAction::Append)]
    pub track_error: Vec<String>,

    /// Never skip failing hosts
    #[arg(long = "no-max-host-error", global = true)]
    pub no_max_host_error: bool,

    /// Hosts remembered by the error cache and per-host rate limiter
    #[arg(long = "max-tracked-hosts", value_name = "COUNT", global = true,
          value_parser = validate_positive_int)]
    pub max_tracked_hosts: Option<usize>,

    /// Enable out-of-band interaction correlation
    #[arg(long = "interactions", global = true)]
    pub interactions: bool,

    /// How often the interaction server is polled
    #[arg(long = "interactions-poll-interval", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub interactions_poll_interval: Option<Duration>,

    /// How long an interaction token stays valid
    #[arg(long = "interactions-eviction", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub interactions_eviction: Option<Duration>,

    /// Extra wait for interactions once dispatching has finished
    #[arg(long = "interactions-cooldown", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub interactions_cooldown: Option<Duration>,

    /// Report progress at this interval
    #[arg(long = "stats-interval", value_name = "DURATION", global = true,
          value_parser = parse_positive_duration)]
    pub stats_interval: Option<Duration>,

    /// Engine mode (standard, thread-safe)
    #[arg(long = "mode", value_name = "MODE", global = true)]
    pub mode: Option<String>,

    /// Log every outcome and default to debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the enumeration order of a template x target matrix
    Plan {
        /// TOML file with [[template]] entries
        #[arg(long = "templates", value_name = "FILE")]
        templates: PathBuf,

        /// Target list, one per line ('#' starts a comment)
        #[arg(long = "targets", value_name = "FILE")]
        targets: PathBuf,

        /// Run the engine with an executor that completes every item offline
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// Decode a raw HTTP response dump
    Replay {
        /// File holding the response (optionally preceded by its request)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the decoded response as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger settings from the merged arguments
    ///
    /// Colour follows `--color`/`--no-color` when given, otherwise whether
    /// stderr is a terminal.
    pub fn log_settings(&self, stderr_is_terminal: bool) -> LogSettings {
        let defaults = LogSettings::default();
        let color = match (self.color, self.no_color) {
            (true, _) => true,
            (_, true) => false,
            _ => stderr_is_terminal,
        };
        LogSettings {
            level: self.log_level.clone().unwrap_or_else(|| {
                if self.scan.verbose {
                    "debug".to_string()
                } else {
                    defaults.level
                }
            }),
            format: self
                .log_format
                .as_deref()
                .and_then(|format| LogFormat::parse(format).ok())
                .unwrap_or(defaults.format),
            file: self
                .log_file
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            color,
        }
    }
}
