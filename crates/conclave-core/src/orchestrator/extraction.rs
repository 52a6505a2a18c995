//! Background knowledge extraction
//!
//! After a turn completes, long responses are mined for durable knowledge
//! in a detached task. Failures there are logged and never reach the turn.

use super::routing::strip_code_fence;
use crate::error::Result;
use crate::event_bus::{EventBus, MemoryAction, OrchestratorEvent};
use async_trait::async_trait;
use conclave_llm::util::truncate_chars;
use conclave_llm::{CompletionRequest, CompletionService};
use conclave_memory::{MemoryCategory, MemoryStore, NewKnowledgeEntry};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

const MAX_KEY_CHARS: usize = 100;

/// Effort level of an extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionComplexity {
    /// Up to 3 entries
    Low,
    /// Up to 6 entries
    Medium,
}

impl ExtractionComplexity {
    /// Pick the level for a response of `len` characters
    #[must_use]
    pub fn for_length(len: usize, medium_threshold: usize) -> Self {
        if len > medium_threshold {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Entry cap for this level
    #[must_use]
    pub fn max_entries(self) -> usize {
        match self {
            Self::Low => 3,
            Self::Medium => 6,
        }
    }
}

impl fmt::Display for ExtractionComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
        })
    }
}

/// Files durable knowledge found in an assistant response
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeExtractor: Send + Sync {
    /// Extract entries from `response`. Returns how many were stored.
    async fn extract(
        &self,
        workspace_id: &str,
        project_id: &str,
        response: &str,
        complexity: ExtractionComplexity,
    ) -> Result<usize>;
}

/// Run an extraction without awaiting it
pub fn spawn_extraction(
    extractor: Arc<dyn KnowledgeExtractor>,
    workspace_id: String,
    project_id: String,
    response: String,
    complexity: ExtractionComplexity,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match extractor
            .extract(&workspace_id, &project_id, &response, complexity)
            .await
        {
            Ok(stored) => debug!(project_id = %project_id, stored, "Knowledge extraction finished"),
            Err(e) => error!(error = %e, project_id = %project_id, "Knowledge extraction failed"),
        }
    })
}

#[derive(Deserialize)]
struct ExtractedEntry {
    category: String,
    key: String,
    content: String,
}

/// Extractor backed by a completion call
pub struct LlmKnowledgeExtractor {
    completion: Arc<dyn CompletionService>,
    memory: MemoryStore,
    events: EventBus,
    model: String,
}

impl LlmKnowledgeExtractor {
    /// Create an extractor using `model` (a full model id)
    pub fn new(
        completion: Arc<dyn CompletionService>,
        memory: MemoryStore,
        events: EventBus,
        model: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            memory,
            events,
            model: model.into(),
        }
    }

    fn system_prompt(complexity: ExtractionComplexity) -> String {
        format!(
            "You extract durable project knowledge from an assistant response.\n\
             Return a JSON array of at most {max} objects shaped like \
             {{\"category\": \"architecture|convention|decision|fact|issue\", \"key\": \"short label\", \"content\": \"one or two sentences\"}}.\n\
             Only include knowledge that stays true beyond this conversation. \
             Return [] when there is nothing worth keeping. Respond ONLY with JSON.",
            max = complexity.max_entries()
        )
    }
}

/// Parse the extractor reply, dropping malformed items and unknown categories
pub(crate) fn parse_extracted(reply: &str, max_entries: usize) -> Vec<(MemoryCategory, String, String)> {
    let items: Vec<serde_json::Value> = match serde_json::from_str(strip_code_fence(reply)) {
        Ok(items) => items,
        Err(e) => {
            debug!(error = %e, "Extraction reply is not a JSON array");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ExtractedEntry>(item).ok())
        .filter_map(|e| {
            let category = e.category.trim().to_lowercase().parse::<MemoryCategory>().ok()?;
            let key = truncate_chars(e.key.trim(), MAX_KEY_CHARS).to_string();
            let content = e.content.trim().to_string();
            (!key.is_empty() && !content.is_empty()).then_some((category, key, content))
        })
        .take(max_entries)
        .collect()
}

#[async_trait]
impl KnowledgeExtractor for LlmKnowledgeExtractor {
    async fn extract(
        &self,
        workspace_id: &str,
        project_id: &str,
        response: &str,
        complexity: ExtractionComplexity,
    ) -> Result<usize> {
        let request = CompletionRequest::new(&self.model)
            .with_system(Self::system_prompt(complexity))
            .with_user(response)
            .with_max_tokens(1024);
        let reply = self.completion.complete(request).await?;

        let entries = parse_extracted(&reply.content, complexity.max_entries());
        let mut stored = 0;
        for (category, key, content) in entries {
            let entry = self
                .memory
                .create(NewKnowledgeEntry::new(workspace_id, category, key, content).for_project(project_id))
                .await?;
            self.events.publish(OrchestratorEvent::MemoryUpdated {
                entry,
                action: MemoryAction::Created,
            });
            stored += 1;
        }

        info!(project_id = %project_id, %complexity, stored, "Knowledge extracted");
        Ok(stored)
    }
}
