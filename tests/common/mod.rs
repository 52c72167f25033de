//! Common test utilities and helpers
//!
//! Executors and emitters shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scanmatrix::scheduler::{
    ExecutionContext, ExecutionError, ExecutionResult, Executor, OutcomeKind, OutcomeRecord,
    ProtocolType, ResultEmitter, EmitError, Target, Template, WorkItem,
};

/// Synchronous decision for one attempt of one work item
pub type Behavior = fn(&WorkItem, u32) -> Result<ExecutionResult, ExecutionError>;

/// Executor that records every call and answers through a [`Behavior`]
pub struct RecordingExecutor {
    behavior: Behavior,
    calls: Mutex<Vec<(String, String, u32)>>,
}

impl RecordingExecutor {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn completing() -> Arc<Self> {
        Self::new(|_, _| Ok(ExecutionResult::completed()))
    }

    /// (template id, target, attempt) in call order
    pub fn calls(&self) -> Vec<(String, String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for_target(&self, target: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, t, _)| t == target)
            .count()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(
        &self,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.calls.lock().unwrap().push((
            item.template_id().to_string(),
            item.target.raw.clone(),
            ctx.attempt,
        ));
        (self.behavior)(item, ctx.attempt)
    }
}

/// Emitter that keeps every outcome
#[derive(Default)]
pub struct CollectingEmitter {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl CollectingEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn kinds_for_target(&self, target: &str) -> Vec<OutcomeKind> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target == target)
            .map(|r| r.outcome)
            .collect()
    }

    pub fn kind_of(&self, template_id: &str, target: &str) -> Option<OutcomeKind> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.template_id == template_id && r.target == target)
            .map(|r| r.outcome)
    }
}

impl ResultEmitter for CollectingEmitter {
    fn emit(&self, record: &OutcomeRecord) -> Result<(), EmitError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn http_templates(ids: &[&str]) -> Vec<Template> {
    ids.iter()
        .map(|id| Template::new(*id, ProtocolType::Http))
        .collect()
}

pub fn targets(raw: &[&str]) -> Vec<Target> {
    raw.iter().map(|t| Target::new(*t)).collect()
}
