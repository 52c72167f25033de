//! Out-of-band confirmation through the interaction correlator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanmatrix::interactions::{CorrelatorConfig, InteractionPayload, WorkItemRef};
use scanmatrix::scheduler::{
    ExecutionContext, ExecutionError, ExecutionResult, Executor, OutcomeKind, ProtocolType,
    ScanConfig, ScanEngine, ScanState, Template, WorkItem,
};

use crate::common::{targets, CollectingEmitter};

/// Registers a token for every interaction template; the server calls back
/// for targets whose host starts with `vulnerable`
struct CallbackExecutor;

#[async_trait]
impl Executor for CallbackExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        let Some(correlator) = ctx.correlator.clone() else {
            return Ok(ExecutionResult::completed());
        };
        if !item.template.interactions {
            return Ok(ExecutionResult::matched());
        }

        let registration = correlator.register(WorkItemRef::new(
            item.template_id(),
            item.target.raw.clone(),
        ));
        if item.host_key().starts_with("vulnerable") {
            let token = registration.token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                correlator.resolve(
                    &token,
                    InteractionPayload {
                        protocol: "dns".to_string(),
                        unique_id: token.clone(),
                        remote_address: "203.0.113.7".to_string(),
                        ..InteractionPayload::default()
                    },
                );
            });
        }
        Ok(ExecutionResult::awaiting_interaction(registration.waiter))
    }
}

fn interaction_engine(emitter: Arc<CollectingEmitter>) -> ScanEngine {
    let config = ScanConfig::builder()
        .unlimited_rate()
        .interactions(CorrelatorConfig {
            poll_interval: Duration::from_secs(1),
            token_timeout: Duration::from_secs(3),
            cooldown: Duration::from_secs(2),
        })
        .build()
        .unwrap();
    ScanEngine::builder()
        .config(config)
        .executor(Arc::new(CallbackExecutor))
        .result_emitter(emitter)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_confirm_and_silence_expires() {
    let emitter = CollectingEmitter::new();
    let engine = interaction_engine(emitter.clone());

    let templates = vec![
        Template::new("ssrf-oob", ProtocolType::Http).with_interactions(true),
        Template::new("panel", ProtocolType::Http),
    ];
    let summary = engine
        .run(
            templates,
            targets(&["https://vulnerable.example", "https://patched.example"]),
        )
        .await
        .unwrap();

    assert_eq!(summary.state, ScanState::Done);
    assert_eq!(
        emitter.kind_of("ssrf-oob", "https://vulnerable.example"),
        Some(OutcomeKind::InteractionConfirmed)
    );
    assert_eq!(
        emitter.kind_of("ssrf-oob", "https://patched.example"),
        Some(OutcomeKind::NoInteraction)
    );
    assert_eq!(summary.stats.interaction_confirmed, 1);
    assert_eq!(summary.stats.no_interaction, 1);
    assert_eq!(summary.stats.matched, 2);
    assert_eq!(summary.stats.finished(), 4);

    let interactions = summary.interactions.unwrap();
    assert_eq!(interactions.issued, 2);
    assert_eq!(interactions.confirmed, 1);
    assert_eq!(interactions.expired, 1);
    assert_eq!(interactions.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_interaction_waiters() {
    let emitter = CollectingEmitter::new();
    let engine = interaction_engine(emitter.clone());
    let cancel = tokio_util::sync::CancellationToken::new();

    let handle = engine.start(
        vec![Template::new("ssrf-oob", ProtocolType::Http).with_interactions(true)],
        targets(&["https://patched.example"]),
        cancel.clone(),
    );
    // well before the token would expire
    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.state, ScanState::Canceled);
    assert_eq!(
        emitter.kind_of("ssrf-oob", "https://patched.example"),
        Some(OutcomeKind::Canceled)
    );
    assert_eq!(summary.interactions.unwrap().pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_callback_is_dropped() {
    let emitter = CollectingEmitter::new();
    let engine = interaction_engine(emitter.clone());

    engine
        .run(
            vec![Template::new("ssrf-oob", ProtocolType::Http).with_interactions(true)],
            targets(&["https://patched.example"]),
        )
        .await
        .unwrap();

    let correlator = engine.correlator().unwrap();
    assert!(!correlator.resolve("0123456789abcdef0123456789abcdef", InteractionPayload::default()));
    assert_eq!(correlator.stats().dropped, 1);
}
