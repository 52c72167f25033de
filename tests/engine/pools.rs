//! Lightweight and headless pools

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanmatrix::scheduler::{
    CostClass, ExecutionContext, ExecutionError, ExecutionResult, Executor, OutcomeKind,
    ProtocolType, ScanConfig, ScanEngine, ScanStrategy, Template, WorkItem,
};
use tokio_util::sync::CancellationToken;

use crate::common::{http_templates, targets, CollectingEmitter};

/// Lightweight probes wait until a headless probe has run
struct GateExecutor {
    gate: CancellationToken,
}

#[async_trait]
impl Executor for GateExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        match item.template.cost_class() {
            CostClass::Headless => self.gate.cancel(),
            CostClass::Lightweight => self.gate.cancelled().await,
        }
        Ok(ExecutionResult::completed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_pools_run_independently() {
    let config = ScanConfig::builder()
        .strategy(ScanStrategy::HostSpray)
        .template_concurrency(1)
        .host_concurrency(1)
        .headless_template_concurrency(1)
        .headless_host_concurrency(1)
        .unlimited_rate()
        .build()
        .unwrap();
    let emitter = CollectingEmitter::new();
    let engine = ScanEngine::builder()
        .config(config)
        .executor(Arc::new(GateExecutor {
            gate: CancellationToken::new(),
        }))
        .result_emitter(emitter.clone())
        .build()
        .unwrap();

    // the lightweight template comes first and blocks its only slot
    let templates = vec![
        Template::new("tech-detect", ProtocolType::Http),
        Template::new("screenshot", ProtocolType::Headless),
    ];
    let summary = engine
        .run(templates, targets(&["https://a.example"]))
        .await
        .unwrap();

    assert_eq!(summary.stats.completed, 2);
    assert_eq!(
        emitter.kind_of("tech-detect", "https://a.example"),
        Some(OutcomeKind::Completed)
    );
    assert_eq!(
        emitter.kind_of("screenshot", "https://a.example"),
        Some(OutcomeKind::Completed)
    );
    // nothing waited for a timeout
    assert!(summary.elapsed < Duration::from_secs(1));
}

/// Tracks the highest number of simultaneous probes
#[derive(Default)]
struct ConcurrencyProbe {
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Executor for ConcurrencyProbe {
    async fn execute(
        &self,
        _item: &WorkItem,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(ExecutionResult::completed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_outer_and_inner_limits_bound_in_flight_probes() {
    let config = ScanConfig::builder()
        .strategy(ScanStrategy::HostSpray)
        .template_concurrency(2)
        .host_concurrency(3)
        .unlimited_rate()
        .build()
        .unwrap();
    let probe = Arc::new(ConcurrencyProbe::default());
    let engine = ScanEngine::builder()
        .config(config)
        .executor(probe.clone())
        .build()
        .unwrap();

    let summary = engine
        .run(
            http_templates(&["a", "b", "c", "d"]),
            targets(&["h1", "h2", "h3", "h4", "h5", "h6"]),
        )
        .await
        .unwrap();

    assert_eq!(summary.stats.completed, 24);
    assert_eq!(probe.peak.load(Ordering::SeqCst), 6);
    assert_eq!(probe.running.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_headless_templates_form_their_own_groups() {
    let config = ScanConfig::builder()
        .strategy(ScanStrategy::TemplateSpray)
        .unlimited_rate()
        .build()
        .unwrap();
    let engine = ScanEngine::builder()
        .config(config)
        .executor(Arc::new(ConcurrencyProbe::default()))
        .build()
        .unwrap();

    let templates: Vec<Arc<Template>> = vec![
        Arc::new(Template::new("dns-probe", ProtocolType::Dns)),
        Arc::new(Template::new("login-flow", ProtocolType::Headless)),
    ];
    let hosts: Vec<Arc<_>> = targets(&["h1", "h2"]).into_iter().map(Arc::new).collect();
    let plan = engine.plan(&templates, &hosts);

    assert_eq!(plan.total(), 4);
    assert_eq!(plan.groups(CostClass::Lightweight).len(), 2);
    assert_eq!(plan.groups(CostClass::Headless).len(), 2);
    assert!(plan
        .groups(CostClass::Headless)
        .iter()
        .flat_map(|g| g.items.iter())
        .all(|item| item.template_id() == "login-flow"));
}
