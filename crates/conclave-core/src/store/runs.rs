use super::rows::{RunRow, ToolRow};
use super::{RunStore, SqliteStore};
use crate::error::Result;
use crate::model::{AgentRun, ToolInvocation, ToolStatus};
use async_trait::async_trait;

#[async_trait]
impl RunStore for SqliteStore {
    async fn create_run(&self, run: &AgentRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_runs (
                id, project_id, parent_run_id, agent_kind, status, model, task,
                response_text, result_summary, cost_usd, input_tokens, output_tokens,
                started_at, completed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.project_id)
        .bind(&run.parent_run_id)
        .bind(run.agent_kind.as_str())
        .bind(run.status.as_str())
        .bind(&run.model)
        .bind(&run.task)
        .bind(&run.response_text)
        .bind(&run.result_summary)
        .bind(run.cost_usd)
        .bind(run.input_tokens as i64)
        .bind(run.output_tokens as i64)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run(&self, id: &str) -> Result<Option<AgentRun>> {
        let row: Option<RunRow> = sqlx::query_as("SELECT * FROM agent_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_run(&self, run: &AgentRun) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE agent_runs SET
                status = ?, model = ?, task = ?, response_text = ?, result_summary = ?,
                cost_usd = ?, input_tokens = ?, output_tokens = ?,
                started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.as_str())
        .bind(&run.model)
        .bind(&run.task)
        .bind(&run.response_text)
        .bind(&run.result_summary)
        .bind(run.cost_usd)
        .bind(run.input_tokens as i64)
        .bind(run.output_tokens as i64)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(&run.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_runs(&self, project_id: &str) -> Result<Vec<AgentRun>> {
        let rows: Vec<RunRow> =
            sqlx::query_as("SELECT * FROM agent_runs WHERE project_id = ? ORDER BY created_at, rowid")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_tool_invocation(&self, invocation: &ToolInvocation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tool_invocations (
                id, run_id, tool_name, input, output, status, started_at, duration_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invocation.id)
        .bind(&invocation.run_id)
        .bind(&invocation.tool_name)
        .bind(&invocation.input)
        .bind(&invocation.output)
        .bind(invocation.status.as_str())
        .bind(invocation.started_at)
        .bind(invocation.duration_ms.map(|ms| ms as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_tool_invocation(
        &self,
        id: &str,
        output: &str,
        status: ToolStatus,
        duration_ms: u64,
    ) -> Result<()> {
        sqlx::query("UPDATE tool_invocations SET output = ?, status = ?, duration_ms = ? WHERE id = ?")
            .bind(output)
            .bind(status.as_str())
            .bind(duration_ms as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tool_invocations(&self, run_id: &str) -> Result<Vec<ToolInvocation>> {
        let rows: Vec<ToolRow> = sqlx::query_as(
            "SELECT * FROM tool_invocations WHERE run_id = ? ORDER BY started_at, rowid",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
