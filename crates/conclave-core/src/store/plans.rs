use super::rows::PlanRow;
use super::{PlanStore, SqliteStore};
use crate::error::{Error, Result};
use crate::model::Plan;
use async_trait::async_trait;

#[async_trait]
impl PlanStore for SqliteStore {
    async fn create_plan(&self, plan: &Plan) -> Result<()> {
        let metadata = plan
            .workflow_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO plans (
                id, project_id, title, summary, steps, status, workflow_metadata,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.project_id)
        .bind(&plan.title)
        .bind(&plan.summary)
        .bind(serde_json::to_string(&plan.steps)?)
        .bind(plan.status.as_str())
        .bind(metadata)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        let row: Option<PlanRow> = sqlx::query_as("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_plan(&self, plan: &Plan) -> Result<()> {
        let metadata = plan
            .workflow_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE plans SET
                title = ?, summary = ?, steps = ?, status = ?, workflow_metadata = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&plan.title)
        .bind(&plan.summary)
        .bind(serde_json::to_string(&plan.steps)?)
        .bind(plan.status.as_str())
        .bind(metadata)
        .bind(plan.updated_at)
        .bind(&plan.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("plan {}", plan.id)));
        }
        Ok(())
    }

    async fn list_plans(&self, project_id: &str) -> Result<Vec<Plan>> {
        let rows: Vec<PlanRow> =
            sqlx::query_as("SELECT * FROM plans WHERE project_id = ? ORDER BY created_at DESC")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
