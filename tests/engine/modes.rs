//! Engine modes and option restrictions

use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanmatrix::interactions::CorrelatorConfig;
use scanmatrix::scheduler::{
    EngineMode, NetworkConfig, NoopObserver, ScanConfig, ScanEngine, ScanError, ScanState,
    StatsObserver, StatsSnapshot,
};

use crate::common::{http_templates, targets, CollectingEmitter, RecordingExecutor};

fn thread_safe() -> scanmatrix::scheduler::ScanConfigBuilder {
    ScanConfig::builder().mode(EngineMode::ThreadSafe)
}

fn rejected_option(result: Result<ScanConfig, ScanError>) -> &'static str {
    match result {
        Err(ScanError::UnsupportedInMode { option, mode }) => {
            assert_eq!(mode, EngineMode::ThreadSafe);
            option
        }
        other => panic!("expected a mode rejection, got {:?}", other),
    }
}

#[test]
fn test_thread_safe_rejects_process_wide_options() {
    assert_eq!(
        rejected_option(
            thread_safe()
                .per_host_rate_limit(10, Duration::from_secs(1))
                .build()
        ),
        "per_host_rate_limit"
    );
    assert_eq!(
        rejected_option(thread_safe().network(NetworkConfig::default()).build()),
        "network"
    );
    assert_eq!(
        rejected_option(
            thread_safe()
                .interactions(CorrelatorConfig::default())
                .build()
        ),
        "interactions"
    );
    assert_eq!(
        rejected_option(thread_safe().stats_interval(Duration::from_secs(5)).build()),
        "stats"
    );
    assert_eq!(
        rejected_option(thread_safe().verbose(true).build()),
        "verbosity"
    );
}

#[test]
fn test_thread_safe_rejects_callbacks() {
    let config = thread_safe().build().unwrap();

    let err = ScanEngine::builder()
        .config(config.clone())
        .executor(RecordingExecutor::completing())
        .result_emitter(CollectingEmitter::new())
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ScanError::UnsupportedInMode {
            option: "result_emitter",
            mode: EngineMode::ThreadSafe
        }
    );

    let err = ScanEngine::builder()
        .config(config)
        .executor(RecordingExecutor::completing())
        .stats_observer(Arc::new(NoopObserver))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ScanError::UnsupportedInMode {
            option: "stats_observer",
            mode: EngineMode::ThreadSafe
        }
    );
}

#[test]
fn test_missing_executor() {
    let err = ScanEngine::builder().build().unwrap_err();
    assert_eq!(err, ScanError::MissingExecutor);
}

#[tokio::test(start_paused = true)]
async fn test_thread_safe_engine_runs() {
    let executor = RecordingExecutor::completing();
    let engine = ScanEngine::builder()
        .config(
            thread_safe()
                .template_concurrency(4)
                .global_rate_limit(100, Duration::from_secs(1))
                .build()
                .unwrap(),
        )
        .executor(executor.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["a", "b"]), targets(&["h1", "h2", "h3"]))
        .await
        .unwrap();

    assert_eq!(summary.state, ScanState::Done);
    assert_eq!(summary.stats.completed, 6);
    assert_eq!(executor.calls().len(), 6);
}

/// Keeps every snapshot it is handed
#[derive(Default)]
struct SnapshotLog {
    snapshots: Mutex<Vec<StatsSnapshot>>,
}

impl StatsObserver for SnapshotLog {
    fn on_stats(&self, snapshot: &StatsSnapshot) {
        self.snapshots.lock().unwrap().push(*snapshot);
    }
}

#[tokio::test(start_paused = true)]
async fn test_standard_mode_reports_periodic_stats() {
    let observer = Arc::new(SnapshotLog::default());
    let engine = ScanEngine::builder()
        .config(
            ScanConfig::builder()
                .global_rate_limit(1, Duration::from_secs(1))
                .stats_interval(Duration::from_millis(500))
                .build()
                .unwrap(),
        )
        .executor(RecordingExecutor::completing())
        .stats_observer(observer.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(http_templates(&["a", "b", "c", "d"]), targets(&["h1"]))
        .await
        .unwrap();
    assert_eq!(summary.stats.completed, 4);

    let snapshots = observer.snapshots.lock().unwrap();
    assert!(snapshots.len() >= 2, "got {} snapshots", snapshots.len());
    assert!(snapshots.iter().all(|s| s.stats.total == 4));
    assert!(snapshots
        .windows(2)
        .all(|w| w[0].stats.finished() <= w[1].stats.finished()));
}
