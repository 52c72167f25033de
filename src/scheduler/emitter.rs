//! Outcome delivery and progress reporting
//!
//! Workers never call the emitter directly. Outcomes go through an
//! unbounded channel to a dedicated task, so a slow or failing emitter can
//! only delay its own output.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::state::ScanState;
use super::types::{OutcomeRecord, ScanStats, StatsCounters};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Result emitter failed: {0}")]
pub struct EmitError(pub String);

/// Receives every finished work item
pub trait ResultEmitter: Send + Sync {
    fn emit(&self, _record: &OutcomeRecord) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Progress snapshot handed to a [`StatsObserver`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub stats: ScanStats,
    pub elapsed: Duration,
    pub state: ScanState,
    pub pending_interactions: usize,
}

/// Periodic progress callback
pub trait StatsObserver: Send + Sync {
    fn on_stats(&self, _snapshot: &StatsSnapshot) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResultEmitter for NoopObserver {}
impl StatsObserver for NoopObserver {}

/// What the emitter task did before the channel closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterReport {
    pub emitted: u64,
    pub failed: u64,
}

/// Sending half used by workers
pub(crate) type OutcomeSender = mpsc::UnboundedSender<OutcomeRecord>;

/// Spawn the task draining outcomes into `emitter`
///
/// The task ends once every sender is dropped.
pub(crate) fn spawn_emitter(
    emitter: Arc<dyn ResultEmitter>,
) -> (OutcomeSender, JoinHandle<EmitterReport>) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<OutcomeRecord>();
    let handle = tokio::spawn(async move {
        let mut report = EmitterReport::default();
        while let Some(record) = receiver.recv().await {
            match emitter.emit(&record) {
                Ok(()) => report.emitted += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!(
                        "Dropping outcome for {} on {}: {}",
                        record.template_id,
                        record.target,
                        e
                    );
                }
            }
        }
        report
    });
    (sender, handle)
}

/// Inputs of the periodic stats task
pub(crate) struct StatsTicker {
    pub observer: Arc<dyn StatsObserver>,
    pub counters: Arc<StatsCounters>,
    pub state: tokio::sync::watch::Receiver<ScanState>,
    pub pending_interactions: Box<dyn Fn() -> usize + Send + Sync>,
    pub started: Instant,
}

impl StatsTicker {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            stats: self.counters.snapshot(),
            elapsed: self.started.elapsed(),
            state: *self.state.borrow(),
            pending_interactions: (self.pending_interactions)(),
        }
    }

    /// Report every `period` until `stop` fires, then once more
    pub(crate) fn spawn(self, period: Duration, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => self.observer.on_stats(&self.snapshot()),
                }
            }
            self.observer.on_stats(&self.snapshot());
        })
    }
}
