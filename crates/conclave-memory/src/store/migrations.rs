use super::MemoryStore;
use crate::error::Result;

impl MemoryStore {
    // ── Migrations ──────────────────────────────────────────────

    pub(crate) async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memory_entries (
                id                TEXT PRIMARY KEY,
                workspace_id      TEXT NOT NULL,
                category          TEXT NOT NULL,
                scope             TEXT NOT NULL DEFAULT 'workspace',
                key               TEXT NOT NULL,
                content           TEXT NOT NULL,
                source_project_id TEXT,
                confidence        REAL NOT NULL DEFAULT 1.0,
                use_count         INTEGER NOT NULL DEFAULT 0,
                promoted_to       TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_memory_workspace
             ON memory_entries(workspace_id, category)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_memory_project
             ON memory_entries(source_project_id)",
        )
        .execute(&self.pool)
        .await?;

        // entry_id is carried unindexed so hits can be joined back to the row.
        sqlx::query(
            "CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
                entry_id UNINDEXED,
                key,
                content,
                category
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
