//! Promotion of memory entries into structured project settings.

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, MemoryAction, OrchestratorEvent};
use crate::store::DataStore;
use chrono::Utc;
use conclave_memory::{KnowledgeEntry, MemoryCategory, MemoryStore};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const NAMING_KEYWORDS: &[&str] = &["naming", "case", "camel", "pascal", "kebab", "snake"];

/// Fields compared when looking for an existing settings item
pub const CONFLICT_FIELDS: &[&str] = &["name", "rule", "title", "term", "target", "id"];

/// Why a promotion was not applied
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Entry does not exist
    #[error("memory entry not found: {0}")]
    NotFound(String),

    /// Entry was promoted before
    #[error("entry {id} already promoted to {target}")]
    AlreadyPromoted {
        /// Entry ID
        id: String,
        /// Existing promotion target
        target: String,
    },

    /// No converter for the entry's category
    #[error("cannot convert {0} entries to settings")]
    NotConvertible(String),
}

/// Settings record produced from a memory entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionResult {
    /// Target settings category
    pub category: &'static str,
    /// Item to store
    pub data: Value,
    /// Human-readable label
    pub label: String,
}

/// What a promotion would do
#[derive(Debug, Clone, Serialize)]
pub struct PromotionPreview {
    /// Source entry
    pub entry: KnowledgeEntry,
    /// Conversion
    pub result: PromotionResult,
    /// Existing settings item sharing an identifier value
    pub conflict: Option<Value>,
}

/// An unpromoted entry and its would-be conversion
#[derive(Debug, Clone, Serialize)]
pub struct PromotionCandidate {
    /// Entry
    pub entry: KnowledgeEntry,
    /// Conversion
    pub result: PromotionResult,
}

fn next_adr_number(metadata: &Map<String, Value>) -> usize {
    let existing = metadata
        .get("adrs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let highest = existing
        .iter()
        .filter_map(|adr| adr.get("id")?.as_str()?.strip_prefix("ADR-")?.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    highest.max(existing.len()) + 1
}

/// Convert a memory entry into a settings record
#[must_use]
pub fn convert_memory_to_settings(
    entry: &KnowledgeEntry,
    metadata: &Map<String, Value>,
) -> Option<PromotionResult> {
    let key = entry.key.as_str();
    let result = match entry.category {
        MemoryCategory::Convention => {
            let lower = entry.content.to_lowercase();
            if NAMING_KEYWORDS.iter().any(|k| lower.contains(k)) {
                PromotionResult {
                    category: "namingConventions",
                    data: json!({ "target": key, "pattern": entry.content }),
                    label: format!("Naming Convention: {key}"),
                }
            } else {
                PromotionResult {
                    category: "codingStandards",
                    data: json!({ "rule": key, "description": entry.content }),
                    label: format!("Coding Standard: {key}"),
                }
            }
        }
        MemoryCategory::Architecture => PromotionResult {
            category: "designPatterns",
            data: json!({ "name": key, "description": entry.content }),
            label: format!("Design Pattern: {key}"),
        },
        MemoryCategory::Decision => PromotionResult {
            category: "adrs",
            data: json!({
                "id": format!("ADR-{}", next_adr_number(metadata)),
                "title": key,
                "status": "accepted",
                "date": Utc::now().date_naive().to_string(),
                "context": format!("Extracted from memory entry: {key}"),
                "decision": entry.content,
            }),
            label: format!("ADR: {key}"),
        },
        MemoryCategory::Fact => PromotionResult {
            category: "domainConcepts",
            data: json!({ "term": key, "definition": entry.content }),
            label: format!("Domain Concept: {key}"),
        },
        MemoryCategory::Issue => PromotionResult {
            category: "knownIssues",
            data: json!({ "title": key, "description": entry.content, "severity": "medium" }),
            label: format!("Known Issue: {key}"),
        },
    };
    Some(result)
}

/// First existing array item that shares an identifier value with `data`
#[must_use]
pub fn find_conflict(existing: Option<&Value>, data: &Value) -> Option<Value> {
    let items = existing?.as_array()?;
    CONFLICT_FIELDS.iter().find_map(|field| {
        let wanted = data.get(*field).filter(|v| !v.is_null())?;
        items.iter().find(|item| item.get(*field) == Some(wanted)).cloned()
    })
}

/// Applies promotions against the project and memory stores
#[derive(Clone)]
pub struct PromotionService {
    store: Arc<dyn DataStore>,
    memory: MemoryStore,
    events: EventBus,
}

impl PromotionService {
    /// Create a promotion service
    pub fn new(store: Arc<dyn DataStore>, memory: MemoryStore, events: EventBus) -> Self {
        Self {
            store,
            memory,
            events,
        }
    }

    async fn load_metadata(&self, project_id: &str) -> Result<Map<String, Value>> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {project_id}")))?;
        Ok(project.metadata)
    }

    /// Preview a promotion. Conflicts are reported, not resolved.
    pub async fn preview_promotion(&self, entry_id: &str, project_id: &str) -> Result<PromotionPreview> {
        let entry = self
            .memory
            .get(entry_id)
            .await?
            .ok_or_else(|| PromotionError::NotFound(entry_id.to_string()))?;
        let metadata = self.load_metadata(project_id).await?;
        let result = convert_memory_to_settings(&entry, &metadata)
            .ok_or_else(|| PromotionError::NotConvertible(entry.category.to_string()))?;
        let conflict = find_conflict(metadata.get(result.category), &result.data);

        Ok(PromotionPreview {
            entry,
            result,
            conflict,
        })
    }

    /// Write the converted record into settings and mark the entry promoted
    pub async fn execute_promotion(&self, entry_id: &str, project_id: &str) -> Result<PromotionResult> {
        let entry = self
            .memory
            .get(entry_id)
            .await?
            .ok_or_else(|| PromotionError::NotFound(entry_id.to_string()))?;
        if let Some(target) = &entry.promoted_to {
            return Err(PromotionError::AlreadyPromoted {
                id: entry.id.clone(),
                target: target.clone(),
            }
            .into());
        }

        let mut metadata = self.load_metadata(project_id).await?;
        let result = convert_memory_to_settings(&entry, &metadata)
            .ok_or_else(|| PromotionError::NotConvertible(entry.category.to_string()))?;

        let target = format!("{}:{}", result.category, result.label);
        if !self.memory.mark_promoted(&entry.id, &target).await? {
            // Lost a race with another promotion of the same entry
            return Err(PromotionError::AlreadyPromoted {
                id: entry.id.clone(),
                target,
            }
            .into());
        }

        let new_value = match metadata.remove(result.category) {
            Some(Value::Array(mut items)) => {
                items.push(result.data.clone());
                Value::Array(items)
            }
            None | Some(Value::Null) => Value::Array(vec![result.data.clone()]),
            Some(_) => result.data.clone(),
        };
        metadata.insert(result.category.to_string(), new_value.clone());
        if let Err(e) = self.store.save_metadata(project_id, &metadata).await {
            // Release the claim so the promotion can be retried
            if let Err(release) = self.memory.clear_promotion(&entry.id, &target).await {
                warn!(entry_id = %entry.id, error = %release, "Failed to release promotion claim");
            }
            return Err(e);
        }

        self.events.publish(OrchestratorEvent::ProjectSettingsUpdated {
            project_id: project_id.to_string(),
            category: Some(result.category.to_string()),
            data: new_value,
            full_metadata: metadata,
            project_fields: None,
        });
        let mut entry = entry;
        entry.promoted_to = Some(target);
        self.events.publish(OrchestratorEvent::MemoryUpdated {
            entry: entry.clone(),
            action: MemoryAction::Updated,
        });

        info!(
            entry_id = %entry.id,
            project_id = %project_id,
            category = result.category,
            label = %result.label,
            "Memory entry promoted to settings"
        );
        Ok(result)
    }

    /// Unpromoted entries with the record each would become
    pub async fn promotion_candidates(
        &self,
        workspace_id: &str,
        project_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<PromotionCandidate>> {
        let metadata = self.load_metadata(project_id).await?;
        let entries = self
            .memory
            .list_promotion_candidates(workspace_id, limit)
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let result = convert_memory_to_settings(&entry, &metadata)?;
                Some(PromotionCandidate { entry, result })
            })
            .collect())
    }
}
