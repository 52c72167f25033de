//! Template and target list files
//!
//! Templates are a TOML file of `[[template]]` tables; targets are plain
//! text, one per line, with `#` starting a comment.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::core::error_handling::ContextualError;
use crate::scheduler::{ProtocolType, Target, Template};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing templates in {}: {source}", path.display())]
    Templates {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Duplicate template id '{id}'")]
    DuplicateTemplate { id: String },
}

impl ContextualError for InputError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TemplateEntry {
    id: String,
    protocol: ProtocolType,
    #[serde(default = "default_request_cost")]
    request_cost: u32,
    #[serde(default)]
    interactions: bool,
}

fn default_request_cost() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    template: Vec<TemplateEntry>,
}

/// Parse a template file; ids must be unique
pub fn parse_templates(text: &str, path: &Path) -> Result<Vec<Arc<Template>>, InputError> {
    let file: TemplateFile = toml::from_str(text).map_err(|source| InputError::Templates {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    let mut templates = Vec::with_capacity(file.template.len());
    for entry in file.template {
        if !seen.insert(entry.id.clone()) {
            return Err(InputError::DuplicateTemplate { id: entry.id });
        }
        templates.push(Arc::new(
            Template::new(entry.id, entry.protocol)
                .with_request_cost(entry.request_cost)
                .with_interactions(entry.interactions),
        ));
    }
    Ok(templates)
}

/// Parse a target list, dropping blanks, comments and repeated targets
pub fn parse_targets(text: &str) -> Vec<Arc<Target>> {
    let mut seen = HashSet::new();
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty() && seen.insert(*line))
        .map(|line| Arc::new(Target::new(line)))
        .collect()
}

async fn read(path: &Path) -> Result<String, InputError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn load_templates(path: &Path) -> Result<Vec<Arc<Template>>, InputError> {
    let text = read(path).await?;
    let templates = parse_templates(&text, path)?;
    log::debug!("Loaded {} templates from {}", templates.len(), path.display());
    Ok(templates)
}

pub async fn load_targets(path: &Path) -> Result<Vec<Arc<Target>>, InputError> {
    let text = read(path).await?;
    let targets = parse_targets(&text);
    log::debug!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}
