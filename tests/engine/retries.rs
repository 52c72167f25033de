//! Transient retries and per-attempt timeouts

use std::time::Duration;

use async_trait::async_trait;
use scanmatrix::scheduler::{
    ExecutionContext, ExecutionError, ExecutionResult, Executor, NetworkConfig, OutcomeKind,
    ScanConfig, ScanEngine, WorkItem, TIMEOUT_ERROR_KIND,
};

use crate::common::{http_templates, targets, CollectingEmitter, RecordingExecutor};

fn with_network(network: NetworkConfig) -> ScanConfig {
    ScanConfig::builder()
        .unlimited_rate()
        .network(network)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried_once() {
    let executor = RecordingExecutor::new(|_, attempt| {
        if attempt == 0 {
            Err(ExecutionError::transient("reset", "connection reset by peer"))
        } else {
            Ok(ExecutionResult::completed())
        }
    });
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(with_network(NetworkConfig {
            retries: 1,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["flaky"]), targets(&["h1"]))
        .await
        .unwrap();

    assert_eq!(summary.stats.completed, 1);
    let records = emitter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, OutcomeKind::Completed);
    assert_eq!(records[0].attempts, 2);
    let attempts: Vec<u32> = executor.calls().iter().map(|c| c.2).collect();
    assert_eq!(attempts, vec![0, 1]);
    // the eventual success leaves no streak behind
    assert!(engine
        .host_errors()
        .record("h1")
        .map_or(true, |r| r.consecutive_errors == 0));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_count_as_one_host_error() {
    let executor = RecordingExecutor::new(|_, _| {
        Err(ExecutionError::transient("reset", "connection reset by peer"))
    });
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(with_network(NetworkConfig {
            retries: 2,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["flaky"]), targets(&["h1"]))
        .await
        .unwrap();

    assert_eq!(summary.stats.failed, 1);
    assert_eq!(executor.calls().len(), 3);
    let records = emitter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert!(records[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("reset")));
    assert_eq!(
        engine.host_errors().record("h1").unwrap().consecutive_errors,
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_not_retried() {
    let executor = RecordingExecutor::new(|_, _| {
        Err(ExecutionError::terminal("refused", "connection refused"))
    });
    let engine = ScanEngine::builder()
        .config(with_network(NetworkConfig {
            retries: 3,
            ..NetworkConfig::default()
        }))
        .executor(executor.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["closed"]), targets(&["h1"]))
        .await
        .unwrap();

    assert_eq!(summary.stats.failed, 1);
    assert_eq!(executor.calls().len(), 1);
}

/// Never answers within any reasonable timeout
struct HangingExecutor;

#[async_trait]
impl Executor for HangingExecutor {
    async fn execute(
        &self,
        _item: &WorkItem,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ExecutionResult::completed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_transient_failure() {
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(with_network(NetworkConfig {
            timeout: Duration::from_secs(2),
            retries: 1,
            ..NetworkConfig::default()
        }))
        .executor(std::sync::Arc::new(HangingExecutor))
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["slow"]), targets(&["h1"]))
        .await
        .unwrap();

    let records = emitter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, OutcomeKind::Failed);
    assert_eq!(records[0].attempts, 2);
    assert!(records[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with(TIMEOUT_ERROR_KIND)));
    assert!(summary.elapsed >= Duration::from_secs(4));
    assert!(summary.elapsed < Duration::from_secs(3600));

    let record = engine.host_errors().record("h1").unwrap();
    assert_eq!(record.tracked_error_kinds.get(TIMEOUT_ERROR_KIND), Some(&1));
}
