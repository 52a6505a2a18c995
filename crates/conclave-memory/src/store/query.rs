use super::MemoryStore;
use crate::error::Result;
use crate::types::{KnowledgeEntry, MemoryCategory, SearchResult};
use sqlx::Row;

const QUALIFIED_COLUMNS: &str = "m.id, m.workspace_id, m.category, m.scope, m.key, m.content, \
     m.source_project_id, m.confidence, m.use_count, m.promoted_to, m.created_at, m.updated_at";

/// Multiplier applied to the category boost before it is subtracted from bm25.
pub const BOOST_MULTIPLIER: f64 = 2.0;

impl MemoryStore {
    // ── Full-text ───────────────────────────────────────────────

    /// Boosted BM25 search. `priority` lists categories from most to least
    /// relevant; the first gets boost 4, the last 0. Lower score is better.
    pub(crate) async fn fts_search(
        &self,
        workspace_id: &str,
        project_id: Option<&str>,
        fts_query: &str,
        priority: &[MemoryCategory; 5],
        limit: u32,
    ) -> Result<Vec<SearchResult>> {
        let sql = format!(
            "SELECT {QUALIFIED_COLUMNS},
                    bm25(memory_fts, 0.0, 5.0, 1.0, 0.5)
                    - (CASE m.category
                         WHEN ?4 THEN 4
                         WHEN ?5 THEN 3
                         WHEN ?6 THEN 2
                         WHEN ?7 THEN 1
                         ELSE 0
                       END) * {BOOST_MULTIPLIER:.1} AS score
             FROM memory_fts
             JOIN memory_entries m ON m.id = memory_fts.entry_id
             WHERE memory_fts MATCH ?1
               AND m.workspace_id = ?2
               AND (m.scope = 'workspace' OR m.source_project_id = ?3)
             ORDER BY score
             LIMIT ?8"
        );
        let rows = sqlx::query(&sql)
            .bind(fts_query)
            .bind(workspace_id)
            .bind(project_id)
            .bind(priority[0].as_str())
            .bind(priority[1].as_str())
            .bind(priority[2].as_str())
            .bind(priority[3].as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(SearchResult {
                    entry: Self::row_to_entry(row)?,
                    rank: row.try_get("score")?,
                })
            })
            .collect()
    }

    /// Most used, most confident visible entries of one category.
    pub(crate) async fn top_in_category(
        &self,
        workspace_id: &str,
        project_id: Option<&str>,
        category: MemoryCategory,
        limit: u32,
    ) -> Result<Vec<KnowledgeEntry>> {
        let sql = format!(
            "SELECT {QUALIFIED_COLUMNS}
             FROM memory_entries m
             WHERE m.workspace_id = ?1
               AND m.category = ?2
               AND (m.scope = 'workspace' OR m.source_project_id = ?3)
             ORDER BY m.use_count DESC, m.confidence DESC, m.updated_at DESC
             LIMIT ?4"
        );
        let rows = sqlx::query(&sql)
            .bind(workspace_id)
            .bind(category.as_str())
            .bind(project_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_entry).collect()
    }
}
