//! Circuit breaking on repeatedly failing hosts

use scanmatrix::scheduler::{
    ExecutionError, ExecutionResult, NetworkConfig, OutcomeKind, ScanConfig, ScanEngine,
    ScanStrategy,
};

use crate::common::{http_templates, targets, CollectingEmitter, RecordingExecutor};

const BAD: &str = "https://bad.example";
const GOOD: &str = "https://good.example";

fn breaker_config(network: NetworkConfig) -> ScanConfig {
    ScanConfig::builder()
        .strategy(ScanStrategy::HostSpray)
        .template_concurrency(1)
        .host_concurrency(1)
        .unlimited_rate()
        .network(network)
        .build()
        .unwrap()
}

fn refuse_bad_host(
    item: &scanmatrix::scheduler::WorkItem,
    _attempt: u32,
) -> Result<ExecutionResult, ExecutionError> {
    if item.target.raw == BAD {
        Err(ExecutionError::terminal("refused", "connection refused"))
    } else {
        Ok(ExecutionResult::completed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_host_skipped_after_threshold() {
    let executor = RecordingExecutor::new(refuse_bad_host);
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(breaker_config(NetworkConfig {
            retries: 0,
            max_host_error: 2,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(
            http_templates(&["t1", "t2", "t3", "t4"]),
            targets(&[BAD, GOOD]),
        )
        .await
        .unwrap();

    assert_eq!(
        emitter.kinds_for_target(BAD),
        vec![
            OutcomeKind::Failed,
            OutcomeKind::Failed,
            OutcomeKind::HostSkipped,
            OutcomeKind::HostSkipped,
        ]
    );
    assert_eq!(executor.calls_for_target(BAD), 2);
    assert_eq!(executor.calls_for_target(GOOD), 4);
    assert_eq!(summary.stats.failed, 2);
    assert_eq!(summary.stats.host_skipped, 2);
    assert_eq!(summary.stats.completed, 4);

    let record = engine.host_errors().record("bad.example:443").unwrap();
    assert_eq!(record.consecutive_errors, 2);
    assert_eq!(record.tracked_error_kinds.get("refused"), Some(&2));
    assert!(engine.host_errors().record("good.example:443").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_untracked_kinds_do_not_trip() {
    let executor = RecordingExecutor::new(refuse_bad_host);
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(breaker_config(NetworkConfig {
            retries: 0,
            max_host_error: 1,
            track_errors: vec!["timeout".to_string()],
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    engine
        .run(http_templates(&["t1", "t2", "t3"]), targets(&[BAD]))
        .await
        .unwrap();

    assert_eq!(executor.calls_for_target(BAD), 3);
    assert!(emitter
        .kinds_for_target(BAD)
        .iter()
        .all(|kind| *kind == OutcomeKind::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_breaker_never_skips() {
    let executor = RecordingExecutor::new(refuse_bad_host);
    let engine = ScanEngine::builder()
        .config(breaker_config(NetworkConfig {
            retries: 0,
            max_host_error: 1,
            disable_max_host_error: true,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["t1", "t2", "t3"]), targets(&[BAD]))
        .await
        .unwrap();

    assert_eq!(executor.calls_for_target(BAD), 3);
    assert_eq!(summary.stats.failed, 3);
    assert_eq!(summary.stats.host_skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_streak() {
    // first attempt on every odd template fails, so the streak never reaches 2
    let executor = RecordingExecutor::new(|item, _| match item.template_id() {
        "t1" | "t3" | "t5" => Err(ExecutionError::terminal("refused", "connection refused")),
        _ => Ok(ExecutionResult::completed()),
    });
    let engine = ScanEngine::builder()
        .config(breaker_config(NetworkConfig {
            retries: 0,
            max_host_error: 2,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(
            http_templates(&["t1", "t2", "t3", "t4", "t5"]),
            targets(&[BAD]),
        )
        .await
        .unwrap();

    assert_eq!(executor.calls_for_target(BAD), 5);
    assert_eq!(summary.stats.failed, 3);
    assert_eq!(summary.stats.completed, 2);
    assert_eq!(summary.stats.host_skipped, 0);
}
