//! Subcommands run end to end

use std::io::Write;

use clap::Parser;
use scanmatrix::app::cli::args::Args;
use scanmatrix::app::cli::config::ConfigError;
use scanmatrix::app::commands::{run, CommandError};
use scanmatrix::scheduler::ScanError;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

fn file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

async fn run_args(argv: &[&str]) -> Result<i32, CommandError> {
    let args = Args::try_parse_from(argv).unwrap();
    let command = args.command.clone().unwrap();
    run(&args, command, None, CancellationToken::new(), false).await
}

#[tokio::test]
async fn test_replay_decodes_dump() {
    let dump = file_with("HTTP/1.1 302 Found\nLocation: /login\n\n");
    let path = dump.path().to_string_lossy().into_owned();

    assert_eq!(run_args(&["scanmatrix", "replay", &path]).await.unwrap(), 0);
    assert_eq!(
        run_args(&["scanmatrix", "replay", "--json", &path])
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_replay_rejects_request_only_dump() {
    let dump = file_with("GET / HTTP/1.1\nHost: a.example\n\n");
    let path = dump.path().to_string_lossy().into_owned();

    let err = run_args(&["scanmatrix", "replay", &path]).await.unwrap_err();
    assert!(matches!(err, CommandError::Decode { .. }));
}

#[tokio::test]
async fn test_plan_and_dry_run() {
    let templates = file_with(
        "[[template]]\nid = \"a\"\nprotocol = \"http\"\n\n[[template]]\nid = \"b\"\nprotocol = \"headless\"\n",
    );
    let targets = file_with("h1\nh2\nh3\n");
    let templates = templates.path().to_string_lossy().into_owned();
    let targets = targets.path().to_string_lossy().into_owned();

    let plan = [
        "scanmatrix",
        "--no-rate-limit",
        "plan",
        "--templates",
        &templates,
        "--targets",
        &targets,
    ];
    assert_eq!(run_args(&plan).await.unwrap(), 0);

    let mut dry_run = plan.to_vec();
    dry_run.push("--dry-run");
    assert_eq!(run_args(&dry_run).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dry_run_with_interactions() {
    let templates = file_with(
        "[[template]]\nid = \"ssrf-oob\"\nprotocol = \"http\"\ninteractions = true\n",
    );
    let targets = file_with("https://a.example\nhttps://b.example\n");
    let templates = templates.path().to_string_lossy().into_owned();
    let targets = targets.path().to_string_lossy().into_owned();

    let code = run_args(&[
        "scanmatrix",
        "--no-rate-limit",
        "--interactions",
        "--interactions-cooldown",
        "1s",
        "plan",
        "--templates",
        &templates,
        "--targets",
        &targets,
        "--dry-run",
    ])
    .await
    .unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_check_config_reports_mode_conflict() {
    let err = run_args(&[
        "scanmatrix",
        "--mode",
        "thread-safe",
        "--stats-interval",
        "5s",
        "check-config",
    ])
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        CommandError::Config(ConfigError::Scan(ScanError::UnsupportedInMode {
            option: "stats",
            ..
        }))
    ));
}
