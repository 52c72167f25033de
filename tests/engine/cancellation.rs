//! Cancelling a running scan

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanmatrix::scheduler::{
    ExecutionContext, ExecutionError, ExecutionResult, Executor, OutcomeKind, ScanConfig,
    ScanEngine, ScanState, WorkItem,
};
use tokio_util::sync::CancellationToken;

use crate::common::{http_templates, targets, CollectingEmitter};

/// Takes one second per probe
struct SlowExecutor;

#[async_trait]
impl Executor for SlowExecutor {
    async fn execute(
        &self,
        _item: &WorkItem,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(ExecutionResult::completed())
    }
}

fn slow_engine(emitter: Arc<CollectingEmitter>) -> ScanEngine {
    let config = ScanConfig::builder()
        .template_concurrency(1)
        .host_concurrency(1)
        .unlimited_rate()
        .build()
        .unwrap();
    ScanEngine::builder()
        .config(config)
        .executor(Arc::new(SlowExecutor))
        .result_emitter(emitter)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_dispatching() {
    let emitter = CollectingEmitter::new();
    let engine = slow_engine(emitter.clone());
    let cancel = CancellationToken::new();

    let handle = engine.start(
        http_templates(&["a", "b", "c", "d", "e"]),
        targets(&["h1", "h2"]),
        cancel.clone(),
    );
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(handle.state(), ScanState::Dispatching);
    cancel.cancel();

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.state, ScanState::Canceled);
    assert_eq!(summary.stats.total, 10);
    assert!(summary.stats.finished() < summary.stats.total);
    assert_eq!(summary.stats.completed, 2);
    assert_eq!(summary.stats.canceled, 1);
    // unstarted items produce no outcome
    assert_eq!(emitter.records().len() as u64, summary.stats.finished());
    assert!(emitter
        .records()
        .iter()
        .any(|r| r.outcome == OutcomeKind::Canceled));
}

#[tokio::test(start_paused = true)]
async fn test_handle_cancel_and_state_updates() {
    let emitter = CollectingEmitter::new();
    let engine = slow_engine(emitter);

    let handle = engine.start(
        http_templates(&["a", "b", "c"]),
        targets(&["h1"]),
        CancellationToken::new(),
    );
    let mut states = handle.subscribe();
    states
        .wait_for(|state| *state == ScanState::Dispatching)
        .await
        .unwrap();

    handle.cancel();
    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.state, ScanState::Canceled);
    assert!(*states.borrow() == ScanState::Canceled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start() {
    let emitter = CollectingEmitter::new();
    let engine = slow_engine(emitter.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = engine
        .start(http_templates(&["a", "b"]), targets(&["h1"]), cancel)
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.state, ScanState::Canceled);
    assert_eq!(summary.stats.completed, 0);
    assert!(emitter
        .records()
        .iter()
        .all(|r| r.outcome == OutcomeKind::Canceled));
}
