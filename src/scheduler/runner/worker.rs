//! Execution of a single work item

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::retry::{retry_transient, RetryOutcome, RetryPolicy};
use crate::core::time::Clock;
use crate::hosterrors::HostErrorCache;
use crate::interactions::{InteractionCorrelator, InteractionOutcome};
use crate::ratelimit::RateLimiter;
use crate::scheduler::config::ScanConfig;
use crate::scheduler::emitter::OutcomeSender;
use crate::scheduler::executor::{ExecutionContext, ExecutionError, ExecutionResult, Executor};
use crate::scheduler::types::{OutcomeKind, OutcomeRecord, StatsCounters, WorkItem};

/// Pool slots held while an item executes
pub(crate) struct Slots {
    pub outer: Arc<OwnedSemaphorePermit>,
    pub inner: OwnedSemaphorePermit,
}

/// Everything a worker needs, shared by all workers of one run
pub(crate) struct Worker {
    pub config: Arc<ScanConfig>,
    pub executor: Arc<dyn Executor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub host_errors: Arc<HostErrorCache>,
    pub correlator: Option<Arc<InteractionCorrelator>>,
    pub outcomes: OutcomeSender,
    pub counters: Arc<StatsCounters>,
    pub clock: Arc<dyn Clock>,
    pub cancel: CancellationToken,
}

impl Worker {
    /// Admit, execute and report one work item
    ///
    /// Order: rate-limit tokens, circuit check, execution with retries.
    /// Pool slots are released before any out-of-band wait.
    pub(crate) async fn run(&self, item: WorkItem, slots: Slots) {
        self.counters.dispatched();
        let cost = item.template.request_cost;

        if self
            .rate_limiter
            .acquire(Some(item.host_key()), cost, &self.cancel)
            .await
            .is_err()
        {
            self.finish(&item, OutcomeKind::Canceled, 0, None);
            return;
        }

        if self.host_errors.should_skip(item.host_key()) {
            log::debug!("Skipping {} on {}: host circuit open", item.template_id(), item.target.raw);
            self.finish(&item, OutcomeKind::HostSkipped, 0, None);
            return;
        }

        let policy = RetryPolicy::immediate(self.config.retries());
        let outcome = retry_transient("execute", &policy, &self.cancel, |attempt| {
            self.attempt(&item, attempt)
        })
        .await;
        drop(slots);

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                self.host_errors.record_result(item.host_key(), true, None);
                self.report_success(&item, value, attempts).await;
            }
            RetryOutcome::Failed { error, attempts } => {
                log::debug!(
                    "{} failed on {} after {} attempts: {}",
                    item.template_id(),
                    item.target.raw,
                    attempts,
                    error
                );
                self.host_errors
                    .record_result(item.host_key(), false, Some(&error.kind));
                self.finish(&item, OutcomeKind::Failed, attempts, Some(error.to_string()));
            }
            RetryOutcome::Canceled { attempts } => {
                self.finish(&item, OutcomeKind::Canceled, attempts, None);
            }
        }
    }

    async fn attempt(&self, item: &WorkItem, attempt: u32) -> Result<ExecutionResult, ExecutionError> {
        // retries are fresh probes and pay for their own tokens
        if attempt > 0 {
            self.rate_limiter
                .acquire(Some(item.host_key()), item.template.request_cost, &self.cancel)
                .await
                .map_err(|e| ExecutionError::terminal("canceled", e.to_string()))?;
        }

        let ctx = ExecutionContext {
            attempt,
            deadline: Instant::now() + self.config.timeout(),
            cancel: self.cancel.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            host_errors: Arc::clone(&self.host_errors),
            correlator: self.correlator.clone(),
        };
        match timeout(self.config.timeout(), self.executor.execute(item, &ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::timed_out(item)),
        }
    }

    async fn report_success(&self, item: &WorkItem, result: ExecutionResult, attempts: u32) {
        let kind = match result.interaction {
            Some(waiter) => match waiter.wait_or_cancel(&self.cancel).await {
                InteractionOutcome::Confirmed(payload) => {
                    log::debug!(
                        "{} on {} confirmed by {} interaction from {}",
                        item.template_id(),
                        item.target.raw,
                        payload.protocol,
                        payload.remote_address
                    );
                    OutcomeKind::InteractionConfirmed
                }
                InteractionOutcome::NoInteraction => OutcomeKind::NoInteraction,
                InteractionOutcome::Canceled => OutcomeKind::Canceled,
            },
            None if result.matched => OutcomeKind::Matched,
            None => OutcomeKind::Completed,
        };
        self.finish(item, kind, attempts, None);
    }

    fn finish(&self, item: &WorkItem, kind: OutcomeKind, attempts: u32, error: Option<String>) {
        self.counters.record(kind);
        let mut record = OutcomeRecord::new(item, kind, attempts, self.clock.system_time());
        if let Some(error) = error {
            record = record.with_error(error);
        }
        if self.config.verbose() {
            log::info!("[{}] {} -> {}", kind, item.template_id(), item.target.raw);
        } else {
            log::trace!("{} on {}: {}", item.template_id(), item.target.raw, kind);
        }
        // the emitter task only stops after every worker is gone
        let _ = self.outcomes.send(record);
    }
}
