use super::rows::TemplateRow;
use super::{SqliteStore, TemplateStore};
use crate::error::Result;
use crate::model::WorkflowTemplate;
use async_trait::async_trait;

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn upsert_template(&self, template: &WorkflowTemplate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_templates (
                id, project_id, name, description, category, steps, is_builtin,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                category = excluded.category,
                steps = excluded.steps,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&template.id)
        .bind(&template.project_id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.category.as_str())
        .bind(serde_json::to_string(&template.steps)?)
        .bind(template.is_builtin)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_template(&self, id: &str) -> Result<Option<WorkflowTemplate>> {
        let row: Option<TemplateRow> =
            sqlx::query_as("SELECT * FROM workflow_templates WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_templates(&self, project_id: Option<&str>) -> Result<Vec<WorkflowTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            r#"
            SELECT * FROM workflow_templates
            WHERE is_builtin = TRUE OR (?1 IS NOT NULL AND project_id = ?1)
            ORDER BY is_builtin DESC, name ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_template(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflow_templates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
