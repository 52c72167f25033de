//! Scan engine: owns the shared components and drives one run at a time
//! through Enumerating, Dispatching, Draining and Done (or Canceled)

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::worker::Worker;
use crate::core::time::{Clock, SystemClock};
use crate::hosterrors::HostErrorCache;
use crate::interactions::{CorrelatorStats, InteractionCorrelator};
use crate::ratelimit::RateLimiter;
use crate::scheduler::config::{ScanConfig, ScanStrategy};
use crate::scheduler::emitter::{
    spawn_emitter, EmitterReport, NoopObserver, ResultEmitter, StatsObserver, StatsTicker,
};
use crate::scheduler::error::ScanError;
use crate::scheduler::executor::Executor;
use crate::scheduler::matrix::{resolve_strategy, ScanPlan};
use crate::scheduler::pool::{run_pool, PoolLimits};
use crate::scheduler::state::{ScanState, StateMachine};
use crate::scheduler::types::{ScanStats, StatsCounters, Target, Template};

/// What a finished run looked like
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub state: ScanState,
    pub strategy: ScanStrategy,
    pub stats: ScanStats,
    pub emitter: EmitterReport,
    pub elapsed: Duration,
    pub interactions: Option<CorrelatorStats>,
}

/// Builds a [`ScanEngine`]
#[derive(Default)]
pub struct ScanEngineBuilder {
    config: Option<ScanConfig>,
    executor: Option<Arc<dyn Executor>>,
    emitter: Option<Arc<dyn ResultEmitter>>,
    observer: Option<Arc<dyn StatsObserver>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ScanEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn result_emitter(mut self, emitter: Arc<dyn ResultEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn stats_observer(mut self, observer: Arc<dyn StatsObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ScanEngine, ScanError> {
        let config = self.config.unwrap_or_default();
        let executor = self.executor.ok_or(ScanError::MissingExecutor)?;

        if config.mode() == crate::scheduler::config::EngineMode::ThreadSafe {
            let rejected = if self.emitter.is_some() {
                Some("result_emitter")
            } else if self.observer.is_some() {
                Some("stats_observer")
            } else {
                None
            };
            if let Some(option) = rejected {
                return Err(ScanError::UnsupportedInMode {
                    option,
                    mode: config.mode(),
                });
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let host_errors = config.host_errors();
        let rate_limiter = RateLimiter::new(
            config.rate_limit(),
            config.per_host_rate_limit(),
            host_errors.max_hosts,
        );
        let correlator = config.interactions().map(|interactions| {
            Arc::new(InteractionCorrelator::with_clock(
                interactions,
                Arc::clone(&clock),
            ))
        });

        Ok(ScanEngine {
            executor,
            emitter: self.emitter.unwrap_or_else(|| Arc::new(NoopObserver)),
            observer: self.observer,
            rate_limiter: Arc::new(rate_limiter),
            host_errors: Arc::new(HostErrorCache::new(host_errors)),
            correlator,
            clock,
            config: Arc::new(config),
        })
    }
}

/// Runs scans with one configuration and shared rate, error and
/// interaction state
pub struct ScanEngine {
    config: Arc<ScanConfig>,
    executor: Arc<dyn Executor>,
    emitter: Arc<dyn ResultEmitter>,
    observer: Option<Arc<dyn StatsObserver>>,
    rate_limiter: Arc<RateLimiter>,
    host_errors: Arc<HostErrorCache>,
    correlator: Option<Arc<InteractionCorrelator>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("config", &self.config)
            .field("tracked_hosts", &self.host_errors.tracked_hosts())
            .field("interactions", &self.correlator.is_some())
            .finish()
    }
}

/// Handle on a running scan
#[derive(Debug)]
pub struct ScanHandle {
    state: watch::Receiver<ScanState>,
    cancel: CancellationToken,
    task: JoinHandle<ScanSummary>,
}

impl ScanHandle {
    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<ScanSummary, ScanError> {
        self.task.await.map_err(|e| ScanError::TaskFailed {
            message: e.to_string(),
        })
    }
}

impl ScanEngine {
    pub fn builder() -> ScanEngineBuilder {
        ScanEngineBuilder::new()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn host_errors(&self) -> &Arc<HostErrorCache> {
        &self.host_errors
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn correlator(&self) -> Option<&Arc<InteractionCorrelator>> {
        self.correlator.as_ref()
    }

    /// Enumerate without executing, using the configured strategy
    pub fn plan(&self, templates: &[Arc<Template>], targets: &[Arc<Target>]) -> ScanPlan {
        let strategy = resolve_strategy(
            self.config.strategy(),
            templates.len(),
            targets.len(),
            self.config.auto_crossover_ratio(),
        );
        ScanPlan::build(templates, targets, strategy)
    }

    /// Start a scan in the background
    ///
    /// `cancel` stops the whole run; the handle can cancel it too.
    pub fn start(
        &self,
        templates: Vec<Template>,
        targets: Vec<Target>,
        cancel: CancellationToken,
    ) -> ScanHandle {
        let machine = StateMachine::new();
        let state = machine.subscribe();
        let run = ScanRun {
            config: Arc::clone(&self.config),
            executor: Arc::clone(&self.executor),
            emitter: Arc::clone(&self.emitter),
            observer: self.observer.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            host_errors: Arc::clone(&self.host_errors),
            correlator: self.correlator.clone(),
            clock: Arc::clone(&self.clock),
            cancel: cancel.clone(),
            machine,
        };
        let task = tokio::spawn(run.execute(
            templates.into_iter().map(Arc::new).collect(),
            targets.into_iter().map(Arc::new).collect(),
        ));

        ScanHandle {
            state,
            cancel,
            task,
        }
    }

    /// Run a scan to completion
    pub async fn run(
        &self,
        templates: Vec<Template>,
        targets: Vec<Target>,
    ) -> Result<ScanSummary, ScanError> {
        self.start(templates, targets, CancellationToken::new())
            .wait()
            .await
    }
}

/// State owned by one background run
struct ScanRun {
    config: Arc<ScanConfig>,
    executor: Arc<dyn Executor>,
    emitter: Arc<dyn ResultEmitter>,
    observer: Option<Arc<dyn StatsObserver>>,
    rate_limiter: Arc<RateLimiter>,
    host_errors: Arc<HostErrorCache>,
    correlator: Option<Arc<InteractionCorrelator>>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    machine: StateMachine,
}

impl ScanRun {
    fn advance(&self, next: ScanState) {
        if let Err(e) = self.machine.advance(next) {
            log::error!("{}", e);
        }
    }

    async fn execute(self, templates: Vec<Arc<Template>>, targets: Vec<Arc<Target>>) -> ScanSummary {
        let started = Instant::now();

        self.advance(ScanState::Enumerating);
        let strategy = resolve_strategy(
            self.config.strategy(),
            templates.len(),
            targets.len(),
            self.config.auto_crossover_ratio(),
        );
        let plan = ScanPlan::build(&templates, &targets, strategy);
        log::info!(
            "Scanning {} templates x {} targets ({} work items, {})",
            templates.len(),
            targets.len(),
            plan.total(),
            strategy
        );

        let counters = Arc::new(StatsCounters::default());
        counters.set_total(plan.total());
        let (outcomes, emitter_task) = spawn_emitter(Arc::clone(&self.emitter));

        let background = CancellationToken::new();
        let poller = self
            .correlator
            .as_ref()
            .map(|correlator| correlator.start(background.clone()));
        let ticker = match (&self.observer, self.config.stats_interval()) {
            (Some(observer), Some(period)) => {
                let correlator = self.correlator.clone();
                let ticker = StatsTicker {
                    observer: Arc::clone(observer),
                    counters: Arc::clone(&counters),
                    state: self.machine.subscribe(),
                    pending_interactions: Box::new(move || {
                        correlator.as_ref().map_or(0, |c| c.pending())
                    }),
                    started,
                };
                Some(ticker.spawn(period, background.clone()))
            }
            _ => None,
        };

        self.advance(ScanState::Dispatching);
        let worker = Arc::new(Worker {
            config: Arc::clone(&self.config),
            executor: Arc::clone(&self.executor),
            rate_limiter: Arc::clone(&self.rate_limiter),
            host_errors: Arc::clone(&self.host_errors),
            correlator: self.correlator.clone(),
            outcomes,
            counters: Arc::clone(&counters),
            clock: Arc::clone(&self.clock),
            cancel: self.cancel.clone(),
        });
        self.dispatch(plan, worker).await;

        if self.cancel.is_cancelled() {
            if let Some(correlator) = &self.correlator {
                correlator.cancel_all();
            }
            self.advance(ScanState::Canceled);
        } else {
            if let Some(correlator) = &self.correlator {
                correlator
                    .drain(correlator.config().cooldown, &self.cancel)
                    .await;
            }
            if self.cancel.is_cancelled() {
                self.advance(ScanState::Canceled);
            } else {
                self.advance(ScanState::Done);
            }
        }

        background.cancel();
        if let Some(poller) = poller {
            let _ = poller.await;
        }
        if let Some(ticker) = ticker {
            let _ = ticker.await;
        }
        // every worker (and its sender) is gone, so this ends
        let emitter = emitter_task.await.unwrap_or_default();

        let summary = ScanSummary {
            state: self.machine.current(),
            strategy,
            stats: counters.snapshot(),
            emitter,
            elapsed: started.elapsed(),
            interactions: self.correlator.as_ref().map(|c| c.stats()),
        };
        log::info!(
            "Scan {} in {:.2?}: {} of {} work items finished",
            summary.state,
            summary.elapsed,
            summary.stats.finished(),
            summary.stats.total
        );
        summary
    }

    /// Run both pools; moves to Draining once nothing is left to hand out
    async fn dispatch(&self, plan: ScanPlan, worker: Arc<Worker>) {
        let concurrency = self.config.concurrency();
        let (light_limits, headless_limits) = match plan.strategy() {
            ScanStrategy::TemplateSpray => (
                PoolLimits {
                    outer: concurrency.host,
                    inner: concurrency.template,
                },
                PoolLimits {
                    outer: concurrency.headless_host,
                    inner: concurrency.headless_template,
                },
            ),
            ScanStrategy::HostSpray | ScanStrategy::Auto => (
                PoolLimits {
                    outer: concurrency.template,
                    inner: concurrency.host,
                },
                PoolLimits {
                    outer: concurrency.headless_template,
                    inner: concurrency.headless_host,
                },
            ),
        };

        let (lightweight, headless) = plan.into_groups();
        let (guard, mut dispatched) = mpsc::channel::<()>(1);
        let pools = join_all(vec![
            run_pool(
                "lightweight",
                lightweight,
                light_limits,
                Arc::clone(&worker),
                self.cancel.clone(),
                guard.clone(),
            ),
            run_pool(
                "headless",
                headless,
                headless_limits,
                worker,
                self.cancel.clone(),
                guard,
            ),
        ]);
        // every guard clone is gone once the last group has been handed out
        let draining = async {
            let _ = dispatched.recv().await;
            if !self.cancel.is_cancelled() {
                self.advance(ScanState::Draining);
            }
        };
        tokio::join!(pools, draining);
    }
}
