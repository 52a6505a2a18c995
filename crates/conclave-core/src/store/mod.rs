//! Persistence for runs, projects, plans and workflow templates.
//!
//! The orchestrator talks to storage through the traits in this module;
//! [`SqliteStore`] implements all of them on one SQLite pool.

mod migrations;
mod plans;
mod projects;
mod rows;
mod runs;
mod templates;


use crate::error::Result;
use crate::model::{
    AgentRun, Plan, Project, ProjectBudget, StoredMessage, ToolInvocation, ToolStatus,
    WorkflowTemplate,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Agent runs and their tool invocations
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a run
    async fn create_run(&self, run: &AgentRun) -> Result<()>;
    /// Run by ID
    async fn get_run(&self, id: &str) -> Result<Option<AgentRun>>;
    /// Overwrite a run
    async fn update_run(&self, run: &AgentRun) -> Result<()>;
    /// Runs of a project, oldest first
    async fn list_runs(&self, project_id: &str) -> Result<Vec<AgentRun>>;
    /// Insert a tool invocation
    async fn create_tool_invocation(&self, invocation: &ToolInvocation) -> Result<()>;
    /// Record the outcome of a tool invocation
    async fn complete_tool_invocation(
        &self,
        id: &str,
        output: &str,
        status: ToolStatus,
        duration_ms: u64,
    ) -> Result<()>;
    /// Tool invocations of a run, oldest first
    async fn list_tool_invocations(&self, run_id: &str) -> Result<Vec<ToolInvocation>>;
}

/// Projects, their settings, chat history and budgets
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a project
    async fn create_project(&self, project: &Project) -> Result<()>;
    /// Project by ID
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;
    /// All projects, newest first
    async fn list_projects(&self) -> Result<Vec<Project>>;
    /// Overwrite project fields and settings
    async fn update_project(&self, project: &Project) -> Result<()>;
    /// Replace the settings map and bump `updated_at`
    async fn save_metadata(&self, project_id: &str, metadata: &Map<String, Value>) -> Result<()>;
    /// Set or clear the resumable setup session
    async fn set_sdk_session_id(&self, project_id: &str, session_id: Option<&str>) -> Result<()>;
    /// Mark setup complete. Returns false when it already was.
    async fn mark_setup_completed(&self, project_id: &str) -> Result<bool>;
    /// Append a chat message
    async fn append_message(&self, message: &StoredMessage) -> Result<()>;
    /// Latest `limit` messages in chronological order
    async fn recent_messages(&self, project_id: &str, limit: usize) -> Result<Vec<StoredMessage>>;
    /// Current usage totals
    async fn get_budget(&self, project_id: &str) -> Result<ProjectBudget>;
    /// Add usage and return the new totals
    async fn add_usage(&self, project_id: &str, tokens: u64, cost_usd: f64) -> Result<ProjectBudget>;
}

/// Plans and their steps
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert a plan
    async fn create_plan(&self, plan: &Plan) -> Result<()>;
    /// Plan by ID
    async fn get_plan(&self, id: &str) -> Result<Option<Plan>>;
    /// Overwrite a plan, steps and metadata included
    async fn update_plan(&self, plan: &Plan) -> Result<()>;
    /// Plans of a project, newest first
    async fn list_plans(&self, project_id: &str) -> Result<Vec<Plan>>;
}

/// Workflow templates
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Insert or replace a template
    async fn upsert_template(&self, template: &WorkflowTemplate) -> Result<()>;
    /// Template by ID
    async fn get_template(&self, id: &str) -> Result<Option<WorkflowTemplate>>;
    /// Built-ins plus the project's own templates; built-ins first, then by name
    async fn list_templates(&self, project_id: Option<&str>) -> Result<Vec<WorkflowTemplate>>;
    /// Delete a template. Returns whether a row was removed.
    async fn delete_template(&self, id: &str) -> Result<bool>;
}

/// Every store the core needs
pub trait DataStore: RunStore + ProjectStore + PlanStore + TemplateStore {}

impl<T: RunStore + ProjectStore + PlanStore + TemplateStore> DataStore for T {}

/// SQLite-backed implementation of all store traits
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "Data store opened");
        Ok(store)
    }

    /// In-memory database for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}
