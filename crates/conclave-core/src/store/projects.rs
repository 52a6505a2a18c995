use super::rows::{MessageRow, ProjectRow};
use super::{ProjectStore, SqliteStore};
use crate::error::{Error, Result};
use crate::model::{Project, ProjectBudget, StoredMessage};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::Row;

#[async_trait]
impl ProjectStore for SqliteStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (
                id, workspace_id, title, description, purpose, primary_language,
                architecture_pattern, directory_path, metadata, setup_completed,
                sdk_session_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.workspace_id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.purpose)
        .bind(&project.primary_language)
        .bind(&project.architecture_pattern)
        .bind(&project.directory_path)
        .bind(serde_json::to_string(&project.metadata)?)
        .bind(project.setup_completed)
        .bind(&project.sdk_session_id)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows: Vec<ProjectRow> =
            sqlx::query_as("SELECT * FROM projects ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects SET
                title = ?, description = ?, purpose = ?, primary_language = ?,
                architecture_pattern = ?, directory_path = ?, metadata = ?,
                setup_completed = ?, sdk_session_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.purpose)
        .bind(&project.primary_language)
        .bind(&project.architecture_pattern)
        .bind(&project.directory_path)
        .bind(serde_json::to_string(&project.metadata)?)
        .bind(project.setup_completed)
        .bind(&project.sdk_session_id)
        .bind(project.updated_at)
        .bind(&project.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("project {}", project.id)));
        }
        Ok(())
    }

    async fn save_metadata(&self, project_id: &str, metadata: &Map<String, Value>) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET metadata = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(metadata)?)
            .bind(Utc::now())
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("project {project_id}")));
        }
        Ok(())
    }

    async fn set_sdk_session_id(&self, project_id: &str, session_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE projects SET sdk_session_id = ? WHERE id = ?")
            .bind(session_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_setup_completed(&self, project_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE projects SET setup_completed = TRUE, updated_at = ?
             WHERE id = ? AND setup_completed = FALSE",
        )
        .bind(Utc::now())
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Messages ────────────────────────────────────────────────

    async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, project_id, role, content, agent_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.project_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.agent_id)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_messages(&self, project_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, role, content, agent_id, created_at FROM (
                SELECT *, rowid AS seq FROM messages
                WHERE project_id = ?
                ORDER BY seq DESC
                LIMIT ?
            ) ORDER BY seq ASC
            "#,
        )
        .bind(project_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    // ── Budget ──────────────────────────────────────────────────

    async fn get_budget(&self, project_id: &str) -> Result<ProjectBudget> {
        let row = sqlx::query("SELECT tokens_used, cost_usd FROM project_budgets WHERE project_id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => ProjectBudget {
                project_id: project_id.to_string(),
                tokens_used: row.try_get::<i64, _>("tokens_used")?.max(0) as u64,
                cost_usd: row.try_get("cost_usd")?,
            },
            None => ProjectBudget {
                project_id: project_id.to_string(),
                ..Default::default()
            },
        })
    }

    async fn add_usage(&self, project_id: &str, tokens: u64, cost_usd: f64) -> Result<ProjectBudget> {
        sqlx::query(
            r#"
            INSERT INTO project_budgets (project_id, tokens_used, cost_usd) VALUES (?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                tokens_used = tokens_used + excluded.tokens_used,
                cost_usd = cost_usd + excluded.cost_usd
            "#,
        )
        .bind(project_id)
        .bind(tokens as i64)
        .bind(cost_usd)
        .execute(&self.pool)
        .await?;
        self.get_budget(project_id).await
    }
}
