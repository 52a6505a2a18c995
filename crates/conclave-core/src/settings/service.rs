use super::directory::{prepare_directory, DirectorySetup};
use super::merge::{apply_update, MergeKind, UpdateMode};
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, MemoryAction, OrchestratorEvent};
use crate::knowledge::{is_overlapping, memory_category_for};
use crate::model::Project;
use crate::store::DataStore;
use chrono::Utc;
use conclave_llm::util::truncate_chars;
use conclave_memory::{KnowledgeEntry, MemoryStore, NewKnowledgeEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const REDIRECT_KEY_CHARS: usize = 100;

/// Result of a settings update
#[derive(Debug, Clone)]
pub enum SettingsUpdate {
    /// The category was written
    Applied {
        /// Category
        category: String,
        /// New stored value
        value: Value,
    },
    /// The category is stable; a memory entry was filed instead
    Redirected {
        /// Entry created in place of the update
        entry: KnowledgeEntry,
        /// Notice for the caller
        notice: String,
    },
}

/// Top-level project fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfoUpdate {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Purpose
    pub purpose: Option<String>,
    /// Primary language
    pub primary_language: Option<String>,
    /// Architecture pattern
    pub architecture_pattern: Option<String>,
}

/// Settings operations exposed to agents and the CLI
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn DataStore>,
    memory: MemoryStore,
    events: EventBus,
    projects_root: Option<PathBuf>,
}

fn compact(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

impl SettingsService {
    /// Create a settings service
    pub fn new(store: Arc<dyn DataStore>, memory: MemoryStore, events: EventBus) -> Self {
        Self {
            store,
            memory,
            events,
            projects_root: None,
        }
    }

    /// Directory under which new and cloned projects are placed
    #[must_use]
    pub fn with_projects_root(mut self, root: Option<PathBuf>) -> Self {
        self.projects_root = root;
        self
    }

    async fn project(&self, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {project_id}")))
    }

    /// All settings, or one category (`null` when unset)
    pub async fn get_project_settings(&self, project_id: &str, category: Option<&str>) -> Result<Value> {
        let project = self.project(project_id).await?;
        Ok(match category {
            Some(category) => project.metadata.get(category).cloned().unwrap_or(Value::Null),
            None => Value::Object(project.metadata),
        })
    }

    /// Update a category with the given mode.
    ///
    /// After setup, updates to overlapping categories become project-scoped
    /// memory entries instead.
    #[tracing::instrument(skip(self, data))]
    pub async fn update_project_settings(
        &self,
        project_id: &str,
        category: &str,
        data: Value,
        mode: UpdateMode,
    ) -> Result<SettingsUpdate> {
        let mut project = self.project(project_id).await?;

        if project.setup_completed && is_overlapping(category) {
            if let Some(memory_category) = memory_category_for(category) {
                let key_source = format!("{category}: {}", compact(&data));
                let key = truncate_chars(&key_source, REDIRECT_KEY_CHARS).to_string();
                let content = format!("[From settings update - {category}] {}", pretty(&data));

                let entry = self
                    .memory
                    .create(
                        NewKnowledgeEntry::new(&project.workspace_id, memory_category, &key, content)
                            .for_project(&project.id),
                    )
                    .await?;
                self.events.publish(OrchestratorEvent::MemoryUpdated {
                    entry: entry.clone(),
                    action: MemoryAction::Created,
                });

                info!(category = %category, entry_id = %entry.id, "Settings update redirected to memory");
                let notice = format!(
                    "Setup is completed. The \"{category}\" category is now stable. Created a memory entry ({memory_category}) instead: \"{key}\". If this knowledge stabilizes, it can be promoted to settings."
                );
                return Ok(SettingsUpdate::Redirected { entry, notice });
            }
        }

        let kind = MergeKind::for_category(category);
        let value = apply_update(project.metadata.get(category), data, kind, mode);
        project.metadata.insert(category.to_string(), value.clone());
        self.store.save_metadata(project_id, &project.metadata).await?;

        self.events.publish(OrchestratorEvent::ProjectSettingsUpdated {
            project_id: project_id.to_string(),
            category: Some(category.to_string()),
            data: value.clone(),
            full_metadata: project.metadata.clone(),
            project_fields: None,
        });
        debug!(category = %category, ?mode, "Settings updated");

        Ok(SettingsUpdate::Applied {
            category: category.to_string(),
            value,
        })
    }

    /// Update top-level project fields. Returns the names of changed fields.
    pub async fn set_project_info(&self, project_id: &str, update: ProjectInfoUpdate) -> Result<Vec<&'static str>> {
        let mut project = self.project(project_id).await?;
        let mut changed = Vec::new();
        let mut fields = Map::new();

        if let Some(title) = update.title {
            fields.insert("title".to_string(), Value::String(title.clone()));
            project.title = title;
            changed.push("title");
        }
        if let Some(description) = update.description {
            fields.insert("description".to_string(), Value::String(description.clone()));
            project.description = Some(description);
            changed.push("description");
        }
        if let Some(purpose) = update.purpose {
            fields.insert("purpose".to_string(), Value::String(purpose.clone()));
            project.purpose = Some(purpose);
            changed.push("purpose");
        }
        if let Some(language) = update.primary_language {
            fields.insert("primaryLanguage".to_string(), Value::String(language.clone()));
            project.primary_language = Some(language);
            changed.push("primaryLanguage");
        }
        if let Some(pattern) = update.architecture_pattern {
            fields.insert("architecturePattern".to_string(), Value::String(pattern.clone()));
            project.architecture_pattern = Some(pattern);
            changed.push("architecturePattern");
        }

        if changed.is_empty() {
            return Ok(changed);
        }

        project.updated_at = Utc::now();
        self.store.update_project(&project).await?;
        self.publish_project_fields(&project, fields);
        Ok(changed)
    }

    /// Prepare the working directory and store its path
    pub async fn setup_project_directory(&self, project_id: &str, setup: DirectorySetup) -> Result<PathBuf> {
        let mut project = self.project(project_id).await?;
        let path = prepare_directory(self.projects_root.as_deref(), &setup).await?;

        let directory = path.display().to_string();
        project.directory_path = Some(directory.clone());
        project.updated_at = Utc::now();
        self.store.update_project(&project).await?;

        let mut fields = Map::new();
        fields.insert("directoryPath".to_string(), Value::String(directory));
        self.publish_project_fields(&project, fields);
        Ok(path)
    }

    fn publish_project_fields(&self, project: &Project, fields: Map<String, Value>) {
        self.events.publish(OrchestratorEvent::ProjectSettingsUpdated {
            project_id: project.id.clone(),
            category: None,
            data: Value::Object(fields.clone()),
            full_metadata: project.metadata.clone(),
            project_fields: Some(fields),
        });
    }

    /// Mark setup complete. Returns false when it already was.
    pub async fn complete_project_setup(&self, project_id: &str) -> Result<bool> {
        self.project(project_id).await?;
        let changed = self.store.mark_setup_completed(project_id).await?;
        if changed {
            self.events.publish(OrchestratorEvent::ProjectSetupCompleted {
                project_id: project_id.to_string(),
            });
            info!(project_id = %project_id, "Project setup completed");
        }
        Ok(changed)
    }
}
