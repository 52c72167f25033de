//! Subcommand implementations

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::cli::args::{Args, Command};
use super::cli::config::ConfigError;
use super::cli::display::{format_config, format_plan, format_response, format_summary, response_json};
use super::inputs::{load_targets, load_templates, InputError};
use crate::core::error_handling::ContextualError;
use crate::core::shutdown::FORCED_EXIT_CODE;
use crate::interactions::{InteractionPayload, WorkItemRef};
use crate::notifications::api::{
    get_notification_service, global_emitter, run_subscriber, Event, EventFilter,
    InteractionEventType, Subscriber,
};
use crate::offlinehttp::{parse_response, DecodeError};
use crate::scheduler::{
    resolve_strategy, ExecutionContext, ExecutionError, ExecutionResult, Executor, ScanEngine,
    ScanError, ScanPlan, ScanState, Target, Template, WorkItem,
};

const PROGRESS_SUBSCRIBER: &str = "cli-progress";
const DRY_RUN_PROTOCOL: &str = "dry-run";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("Cannot render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContextualError for CommandError {
    fn is_user_actionable(&self) -> bool {
        match self {
            CommandError::Config(e) => e.is_user_actionable(),
            CommandError::Input(e) => e.is_user_actionable(),
            CommandError::Scan(e) => e.is_user_actionable(),
            CommandError::Read { .. } | CommandError::Decode { .. } => true,
            CommandError::Json(_) => false,
        }
    }

    fn user_message(&self) -> Option<Cow<'_, str>> {
        match self {
            CommandError::Config(e) => e.user_message(),
            CommandError::Input(e) => e.user_message(),
            CommandError::Scan(e) => e.user_message(),
            CommandError::Read { .. } | CommandError::Decode { .. } => {
                Some(Cow::Owned(self.to_string()))
            }
            CommandError::Json(_) => None,
        }
    }
}

/// Execute `command` and return the process exit code
pub async fn run(
    args: &Args,
    command: Command,
    config_source: Option<&Path>,
    cancel: CancellationToken,
    use_color: bool,
) -> Result<i32, CommandError> {
    match command {
        Command::Plan {
            templates,
            targets,
            dry_run,
        } => plan(args, &templates, &targets, dry_run, cancel, use_color).await,
        Command::Replay { file, json } => replay(&file, json, use_color).await,
        Command::CheckConfig => {
            let config = args.scan.scan_config()?;
            print!("{}", format_config(&config, config_source, use_color));
            Ok(0)
        }
    }
}

async fn plan(
    args: &Args,
    templates_path: &Path,
    targets_path: &Path,
    dry_run: bool,
    cancel: CancellationToken,
    use_color: bool,
) -> Result<i32, CommandError> {
    let config = args.scan.scan_config()?;
    let templates = load_templates(templates_path).await?;
    let targets = load_targets(targets_path).await?;

    if !dry_run {
        let strategy = resolve_strategy(
            config.strategy(),
            templates.len(),
            targets.len(),
            config.auto_crossover_ratio(),
        );
        let plan = ScanPlan::build(&templates, &targets, strategy);
        print!("{}", format_plan(&plan, config.strategy(), use_color));
        return Ok(0);
    }

    let scan_id = uuid::Uuid::new_v4().simple().to_string();
    let bridge = Arc::new(global_emitter(scan_id.as_str()));
    let engine = ScanEngine::builder()
        .config(config)
        .executor(Arc::new(OfflineExecutor))
        .result_emitter(bridge.clone())
        .stats_observer(bridge.clone())
        .build()?;

    let receiver = get_notification_service().subscribe(
        PROGRESS_SUBSCRIBER.to_string(),
        EventFilter::All,
        format!("app:plan:{}", scan_id),
    );
    let printer = tokio::spawn(run_subscriber(
        receiver,
        Arc::new(ProgressPrinter {
            id: PROGRESS_SUBSCRIBER.to_string(),
        }),
    ));

    let handle = engine.start(
        templates.iter().map(|t| Template::clone(t)).collect(),
        targets.iter().map(|t| Target::clone(t)).collect(),
        cancel,
    );
    let follower = bridge.follow_state(handle.subscribe());
    let summary = handle.wait().await;
    let _ = follower.await;

    // dropping the subscription closes the channel and ends the printer
    get_notification_service().unsubscribe(PROGRESS_SUBSCRIBER);
    let _ = printer.await;

    let summary = summary?;
    eprint!("{}", format_summary(&summary, use_color));
    Ok(match summary.state {
        ScanState::Canceled => FORCED_EXIT_CODE,
        _ => 0,
    })
}

async fn replay(file: &Path, json: bool, use_color: bool) -> Result<i32, CommandError> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CommandError::Read {
            path: file.to_path_buf(),
            source,
        })?;
    let response = parse_response(&raw).map_err(|source| CommandError::Decode {
        path: file.to_path_buf(),
        source,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response_json(&response))?);
    } else {
        print!("{}", format_response(&response, use_color));
    }
    Ok(0)
}

/// Completes every work item without touching the network
///
/// Templates that expect an out-of-band callback register a token and
/// answer it at once, so the correlator and interaction events run as they
/// would in a live scan.
struct OfflineExecutor;

#[async_trait]
impl Executor for OfflineExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        log::trace!(
            "Dry run of {} on {} (attempt {})",
            item.template_id(),
            item.target.raw,
            ctx.attempt
        );

        let correlator = match &ctx.correlator {
            Some(correlator) if item.template.interactions => correlator,
            _ => return Ok(ExecutionResult::completed()),
        };
        let registration = correlator.register(WorkItemRef::new(
            item.template_id(),
            item.target.raw.clone(),
        ));
        let payload = InteractionPayload {
            protocol: DRY_RUN_PROTOCOL.to_string(),
            unique_id: registration.token.clone(),
            full_id: format!("{}.{}", registration.token, item.host_key()),
            remote_address: item.host_key().to_string(),
            ..InteractionPayload::default()
        };
        correlator.resolve(&registration.token, payload);
        Ok(ExecutionResult::awaiting_interaction(registration.waiter))
    }
}

/// Prints outcomes to stdout and progress to the log
struct ProgressPrinter {
    id: String,
}

#[async_trait]
impl Subscriber for ProgressPrinter {
    async fn handle_event(
        &self,
        event: Event,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            Event::Outcome(record) => {
                println!(
                    "[{}] {} -> {}",
                    record.outcome, record.template_id, record.target
                );
            }
            Event::Stats(snapshot) => log::info!(
                "{}: {}/{} finished, {} pending interactions",
                snapshot.state,
                snapshot.stats.finished(),
                snapshot.stats.total,
                snapshot.pending_interactions
            ),
            Event::Scan(scan) => log::debug!("Scan {} is {}", scan.scan_id, scan.state),
            Event::Interaction(interaction) => match interaction.event_type {
                InteractionEventType::Confirmed => log::info!(
                    "Interaction confirmed {} on {}",
                    interaction.template_id,
                    interaction.target
                ),
                InteractionEventType::Expired => log::debug!(
                    "No interaction for {} on {}",
                    interaction.template_id,
                    interaction.target
                ),
            },
        }
        Ok(())
    }

    fn subscriber_id(&self) -> &str {
        &self.id
    }
}
