//! Configuration file discovery and merging

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use scanmatrix::app::cli::args::Args;
use scanmatrix::app::cli::config::{load_config_file, ConfigError};
use scanmatrix::scheduler::{EngineMode, ScanError, ScanStrategy};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_explicit_file_is_loaded() {
    let file = config_file(
        r#"
scan-strategy = "template-spray"
template-concurrency = 8
host-concurrency = "4"
rate-limit = 50
rate-limit-duration = "2s"
timeout = "5s"
retries = 2
max-host-error = 10
track-error = ["timeout", "refused"]
interactions-eviction = 90
log-level = "debug"
"#,
    );

    let (path, table) = load_config_file(Some(file.path())).await.unwrap().unwrap();
    assert_eq!(path, file.path());

    let mut args = Args::try_parse_from(["scanmatrix", "--host-concurrency", "2", "check-config"]).unwrap();
    args.apply_toml_values(&table).unwrap();
    assert_eq!(args.log_level.as_deref(), Some("debug"));

    let config = args.scan.scan_config().unwrap();
    assert_eq!(config.strategy(), ScanStrategy::TemplateSpray);
    assert_eq!(config.concurrency().template, 8);
    // the command line wins over the file
    assert_eq!(config.concurrency().host, 2);
    let rate = config.rate_limit().unwrap();
    assert_eq!(rate.max_tokens, 50);
    assert_eq!(rate.interval, Duration::from_secs(2));
    assert_eq!(config.timeout(), Duration::from_secs(5));
    assert_eq!(config.retries(), 2);
    assert_eq!(config.network().max_host_error, 10);
    assert_eq!(config.network().track_errors, vec!["timeout", "refused"]);
    assert_eq!(
        config.interactions().unwrap().token_timeout,
        Duration::from_secs(90)
    );
}

#[tokio::test]
async fn test_missing_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = load_config_file(Some(&missing)).await.unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[tokio::test]
async fn test_malformed_file() {
    let file = config_file("template-concurrency = [");
    let err = load_config_file(Some(file.path())).await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[tokio::test]
async fn test_invalid_value_names_key() {
    let file = config_file("host-concurrency = 0\n");
    let (_, table) = load_config_file(Some(file.path())).await.unwrap().unwrap();

    let mut args = Args::try_parse_from(["scanmatrix", "check-config"]).unwrap();
    match args.apply_toml_values(&table) {
        Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "host-concurrency"),
        other => panic!("expected an invalid value, got {:?}", other),
    }
}

#[tokio::test]
async fn test_thread_safe_mode_from_file() {
    let file = config_file("mode = \"thread-safe\"\nper-host-rate-limit = 5\n");
    let (_, table) = load_config_file(Some(file.path())).await.unwrap().unwrap();

    let mut args = Args::try_parse_from(["scanmatrix", "check-config"]).unwrap();
    args.apply_toml_values(&table).unwrap();
    match args.scan.scan_config() {
        Err(ConfigError::Scan(ScanError::UnsupportedInMode { option, mode })) => {
            assert_eq!(option, "per_host_rate_limit");
            assert_eq!(mode, EngineMode::ThreadSafe);
        }
        other => panic!("expected a mode rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_zero_rate_limit_means_unlimited() {
    let file = config_file("rate-limit = 0\nlog-file = \"none\"\n");
    let (_, table) = load_config_file(Some(file.path())).await.unwrap().unwrap();

    let mut args = Args::try_parse_from(["scanmatrix", "check-config"]).unwrap();
    args.apply_toml_values(&table).unwrap();
    assert!(args.log_file.is_none());
    assert!(args.scan.scan_config().unwrap().rate_limit().is_none());
}
