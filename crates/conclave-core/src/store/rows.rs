//! Internal row types for database queries

use crate::error::{Error, Result};
use crate::model::{
    AgentRun, Plan, Project, StoredMessage, ToolInvocation, WorkflowTemplate,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(FromRow)]
pub(super) struct ProjectRow {
    pub id: String,
    pub workspace_id: String,
    pub title: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub primary_language: Option<String>,
    pub architecture_pattern: Option<String>,
    pub directory_path: Option<String>,
    pub metadata: String,
    pub setup_completed: bool,
    pub sdk_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = Error;

    fn try_from(row: ProjectRow) -> Result<Self> {
        Ok(Project {
            id: row.id,
            workspace_id: row.workspace_id,
            title: row.title,
            description: row.description,
            purpose: row.purpose,
            primary_language: row.primary_language,
            architecture_pattern: row.architecture_pattern,
            directory_path: row.directory_path,
            metadata: serde_json::from_str(&row.metadata)?,
            setup_completed: row.setup_completed,
            sdk_session_id: row.sdk_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct MessageRow {
    pub id: String,
    pub project_id: String,
    pub role: String,
    pub content: String,
    pub agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(StoredMessage {
            id: row.id,
            project_id: row.project_id,
            role: row.role.parse()?,
            content: row.content,
            agent_id: row.agent_id,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct RunRow {
    pub id: String,
    pub project_id: String,
    pub parent_run_id: Option<String>,
    pub agent_kind: String,
    pub status: String,
    pub model: String,
    pub task: String,
    pub response_text: Option<String>,
    pub result_summary: Option<String>,
    pub cost_usd: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RunRow> for AgentRun {
    type Error = Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(AgentRun {
            id: row.id,
            project_id: row.project_id,
            parent_run_id: row.parent_run_id,
            agent_kind: row.agent_kind.parse()?,
            status: row.status.parse()?,
            model: row.model,
            task: row.task,
            response_text: row.response_text,
            result_summary: row.result_summary,
            cost_usd: row.cost_usd,
            input_tokens: row.input_tokens.max(0) as u64,
            output_tokens: row.output_tokens.max(0) as u64,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct ToolRow {
    pub id: String,
    pub run_id: String,
    pub tool_name: String,
    pub input: String,
    pub output: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}

impl TryFrom<ToolRow> for ToolInvocation {
    type Error = Error;

    fn try_from(row: ToolRow) -> Result<Self> {
        Ok(ToolInvocation {
            id: row.id,
            run_id: row.run_id,
            tool_name: row.tool_name,
            input: row.input,
            output: row.output,
            status: row.status.parse()?,
            started_at: row.started_at,
            duration_ms: row.duration_ms.map(|ms| ms.max(0) as u64),
        })
    }
}

#[derive(FromRow)]
pub(super) struct PlanRow {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub steps: String,
    pub status: String,
    pub workflow_metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = Error;

    fn try_from(row: PlanRow) -> Result<Self> {
        Ok(Plan {
            id: row.id,
            project_id: row.project_id,
            title: row.title,
            summary: row.summary,
            steps: serde_json::from_str(&row.steps)?,
            status: row.status.parse()?,
            workflow_metadata: row
                .workflow_metadata
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct TemplateRow {
    pub id: String,
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub category: String,
    pub steps: String,
    pub is_builtin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for WorkflowTemplate {
    type Error = Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        Ok(WorkflowTemplate {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            category: row.category.parse()?,
            steps: serde_json::from_str(&row.steps)?,
            is_builtin: row.is_builtin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
