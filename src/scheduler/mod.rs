//! Scan Matrix Scheduler
//!
//! Turns a set of templates and a set of targets into work items, runs them
//! through two bounded worker pools and reports one outcome per item.
//!
//! # Overview
//!
//! - **Strategy**: host-spray walks templates in the outer loop, template-spray
//!   walks targets in the outer loop; `auto` picks by the ratio of the two.
//! - **Pools**: lightweight and headless templates run in disjoint pools, each
//!   bounding the outer axis and, per outer element, the inner axis.
//! - **Admission**: every worker takes rate-limit tokens, then asks the host
//!   error cache whether the host is still worth probing.
//! - **Outcomes**: delivered on a dedicated task to a [`ResultEmitter`];
//!   progress goes to an optional [`StatsObserver`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Enumerating -> Dispatching -> Draining -> Done
//!                              |            |
//!                              +-> Canceled <+
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use scanmatrix::scheduler::{
//!     ExecutionContext, ExecutionError, ExecutionResult, Executor, ProtocolType, ScanConfig,
//!     ScanEngine, ScanStrategy, Target, Template, WorkItem,
//! };
//! use std::sync::Arc;
//!
//! struct Probe;
//!
//! #[async_trait]
//! impl Executor for Probe {
//!     async fn execute(
//!         &self,
//!         _item: &WorkItem,
//!         _ctx: &ExecutionContext,
//!     ) -> Result<ExecutionResult, ExecutionError> {
//!         Ok(ExecutionResult::completed())
//!     }
//! }
//!
//! # async fn example() -> Result<(), scanmatrix::scheduler::ScanError> {
//! let config = ScanConfig::builder()
//!     .strategy(ScanStrategy::TemplateSpray)
//!     .build()?;
//! let engine = ScanEngine::builder()
//!     .config(config)
//!     .executor(Arc::new(Probe))
//!     .build()?;
//!
//! let summary = engine
//!     .run(
//!         vec![Template::new("tech-detect", ProtocolType::Http)],
//!         vec![Target::new("https://example.com")],
//!     )
//!     .await?;
//! println!("{} items finished", summary.stats.finished());
//! # Ok(())
//! # }
//! ```

mod config;
mod emitter;
mod error;
mod executor;
mod matrix;
mod pool;
mod runner;
mod state;
mod types;

pub use config::{
    Concurrency, EngineMode, NetworkConfig, ScanConfig, ScanConfigBuilder, ScanStrategy,
    DEFAULT_AUTO_CROSSOVER_RATIO, DEFAULT_HEADLESS_HOST_CONCURRENCY,
    DEFAULT_HEADLESS_TEMPLATE_CONCURRENCY, DEFAULT_HOST_CONCURRENCY, DEFAULT_RETRIES,
    DEFAULT_TEMPLATE_CONCURRENCY, DEFAULT_TIMEOUT,
};
pub use emitter::{
    EmitError, EmitterReport, NoopObserver, ResultEmitter, StatsObserver, StatsSnapshot,
};
pub use error::ScanError;
pub use executor::{
    ExecutionContext, ExecutionError, ExecutionResult, Executor, TIMEOUT_ERROR_KIND,
};
pub use matrix::{resolve_strategy, OuterGroup, ScanPlan};
pub use runner::engine::{ScanEngine, ScanEngineBuilder, ScanHandle, ScanSummary};
pub use state::ScanState;
pub use types::{
    CostClass, OutcomeKind, OutcomeRecord, ProtocolType, ScanStats, Target, Template, WorkItem,
};
