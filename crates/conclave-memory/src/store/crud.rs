use super::{decode_ts, encode_ts, now, MemoryStore};
use crate::error::{Error, Result};
use crate::types::{KnowledgeEntry, KnowledgeEntryUpdate, NewKnowledgeEntry};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

pub(crate) const ENTRY_COLUMNS: &str = "id, workspace_id, category, scope, key, content, \
     source_project_id, confidence, use_count, promoted_to, created_at, updated_at";

/// Default cap for promotion candidate listings.
pub const DEFAULT_CANDIDATE_LIMIT: u32 = 20;

impl MemoryStore {
    // ── Entries ─────────────────────────────────────────────────

    /// Create an entry and index it for full-text search.
    pub async fn create(&self, new: NewKnowledgeEntry) -> Result<KnowledgeEntry> {
        let now = now();
        let entry = KnowledgeEntry {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: new.workspace_id,
            category: new.category,
            scope: new.scope,
            key: new.key,
            content: new.content,
            source_project_id: new.source_project_id,
            confidence: new.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
            use_count: 0,
            promoted_to: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO memory_entries
             (id, workspace_id, category, scope, key, content, source_project_id,
              confidence, use_count, promoted_to, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, ?9, ?9)",
        )
        .bind(&entry.id)
        .bind(&entry.workspace_id)
        .bind(entry.category.as_str())
        .bind(entry.scope.as_str())
        .bind(&entry.key)
        .bind(&entry.content)
        .bind(&entry.source_project_id)
        .bind(entry.confidence)
        .bind(encode_ts(now))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO memory_fts (entry_id, key, content, category) VALUES (?1, ?2, ?3, ?4)")
            .bind(&entry.id)
            .bind(&entry.key)
            .bind(&entry.content)
            .bind(entry.category.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(id = %entry.id, category = %entry.category, "Memory entry created");
        Ok(entry)
    }

    /// Get an entry by ID.
    pub async fn get(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM memory_entries WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    /// Apply a partial update. Bumps `updated_at` and keeps the index in sync.
    pub async fn update(&self, id: &str, update: KnowledgeEntryUpdate) -> Result<KnowledgeEntry> {
        let mut entry = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("memory entry {id}")))?;
        if update.is_empty() {
            return Ok(entry);
        }

        if let Some(category) = update.category {
            entry.category = category;
        }
        if let Some(key) = update.key {
            entry.key = key;
        }
        if let Some(content) = update.content {
            entry.content = content;
        }
        if let Some(confidence) = update.confidence {
            entry.confidence = confidence.clamp(0.0, 1.0);
        }
        entry.updated_at = now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE memory_entries
             SET category = ?2, key = ?3, content = ?4, confidence = ?5, updated_at = ?6
             WHERE id = ?1",
        )
        .bind(&entry.id)
        .bind(entry.category.as_str())
        .bind(&entry.key)
        .bind(&entry.content)
        .bind(entry.confidence)
        .bind(encode_ts(entry.updated_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE memory_fts SET key = ?2, content = ?3, category = ?4 WHERE entry_id = ?1")
            .bind(&entry.id)
            .bind(&entry.key)
            .bind(&entry.content)
            .bind(entry.category.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(entry)
    }

    /// Delete an entry. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM memory_fts WHERE entry_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM memory_entries WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// All entries of a workspace, most recently updated first.
    pub async fn list_by_workspace(&self, workspace_id: &str) -> Result<Vec<KnowledgeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM memory_entries
             WHERE workspace_id = ?1 ORDER BY updated_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(workspace_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Entries produced by a project, most recently updated first.
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<KnowledgeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM memory_entries
             WHERE source_project_id = ?1 ORDER BY updated_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Record the promotion target. Only succeeds once per entry.
    pub async fn mark_promoted(&self, id: &str, target: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE memory_entries SET promoted_to = ?2
             WHERE id = ?1 AND promoted_to IS NULL",
        )
        .bind(id)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Undo [`mark_promoted`](Self::mark_promoted) when it still points at
    /// `target`. Returns whether the mark was cleared.
    pub async fn clear_promotion(&self, id: &str, target: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE memory_entries SET promoted_to = NULL
             WHERE id = ?1 AND promoted_to = ?2",
        )
        .bind(id)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unpromoted entries ordered by use count, confidence, then recency.
    pub async fn list_promotion_candidates(
        &self,
        workspace_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<KnowledgeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM memory_entries
             WHERE workspace_id = ?1 AND promoted_to IS NULL
             ORDER BY use_count DESC, confidence DESC, updated_at DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Increment use counts once per distinct ID. Does not touch `updated_at`.
    pub async fn increment_use_counts(&self, ids: &[String]) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        let mut tx = self.pool.begin().await?;
        for id in ids.iter().filter(|id| seen.insert(id.as_str())) {
            sqlx::query("UPDATE memory_entries SET use_count = use_count + 1 WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Total number of entries in a workspace.
    pub async fn count(&self, workspace_id: &str) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM memory_entries WHERE workspace_id = ?1")
            .bind(workspace_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("cnt")? as u32)
    }

    // ── Row mapping ─────────────────────────────────────────────

    pub(crate) fn row_to_entry(row: &SqliteRow) -> Result<KnowledgeEntry> {
        let category: String = row.try_get("category")?;
        let scope: String = row.try_get("scope")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let use_count: i64 = row.try_get("use_count")?;

        Ok(KnowledgeEntry {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            category: category.parse()?,
            scope: scope.parse()?,
            key: row.try_get("key")?,
            content: row.try_get("content")?,
            source_project_id: row.try_get("source_project_id")?,
            confidence: row.try_get("confidence")?,
            use_count: use_count.max(0) as u32,
            promoted_to: row.try_get("promoted_to")?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
        })
    }
}
