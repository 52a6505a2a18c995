//! Memory Search Engine
//!
//! Intent-aware ranking over the knowledge store:
//!
//! ```text
//! query ──► tokenize ──► FTS5 bm25 ─ boost(intent priority) ──► ranked
//!   │            │ (no tokens / no rows)
//!   └─ intent ───┴──► category fallback slots ──► ranked (rank 0)
//! ```
//!
//! Every returned entry has its use count bumped once per call.

mod intent;
mod tokenize;


pub use intent::{detect_task_intent, TaskIntent};
pub use tokenize::{build_fts_query, tokenize, MAX_TOKENS};

use crate::error::Result;
use crate::store::MemoryStore;
use crate::types::SearchResult;
use tracing::debug;

/// Share of the result limit given to each priority slot, highest first.
pub const FALLBACK_SLOT_RATIOS: [f64; 5] = [0.40, 0.25, 0.15, 0.10, 0.10];

/// Most entries the priority slot at `index` may take for a given limit.
#[must_use]
pub fn fallback_slot_cap(limit: u32, index: usize) -> u32 {
    let ratio = FALLBACK_SLOT_RATIOS.get(index).copied().unwrap_or(0.0);
    ((f64::from(limit) * ratio).round() as u32).max(1)
}

impl MemoryStore {
    /// Rank visible entries against `query`.
    ///
    /// `intent` overrides classification of the raw query when given.
    #[tracing::instrument(skip(self, query), fields(detected_intent = tracing::field::Empty))]
    pub async fn search(
        &self,
        workspace_id: &str,
        project_id: Option<&str>,
        query: &str,
        intent: Option<TaskIntent>,
        limit: u32,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let intent = intent.unwrap_or_else(|| detect_task_intent(query));
        tracing::Span::current().record("detected_intent", intent.as_str());
        let priority = intent.priority();

        let mut results = match build_fts_query(query) {
            Some(fts) => {
                self.fts_search(workspace_id, project_id, &fts, priority, limit)
                    .await?
            }
            None => Vec::new(),
        };

        if results.is_empty() {
            debug!("No full-text match, using category fallback");
            results = self
                .category_fallback(workspace_id, project_id, intent, limit)
                .await?;
        }

        let mut ids: Vec<String> = results.iter().map(|r| r.entry.id.clone()).collect();
        ids.sort();
        ids.dedup();
        self.increment_use_counts(&ids).await?;
        for result in &mut results {
            result.entry.use_count += 1;
        }

        debug!(count = results.len(), "Memory search complete");
        Ok(results)
    }

    async fn category_fallback(
        &self,
        workspace_id: &str,
        project_id: Option<&str>,
        intent: TaskIntent,
        limit: u32,
    ) -> Result<Vec<SearchResult>> {
        let mut results: Vec<SearchResult> = Vec::new();
        for (index, category) in intent.priority().iter().enumerate() {
            let remaining = limit.saturating_sub(results.len() as u32);
            if remaining == 0 {
                break;
            }
            let take = fallback_slot_cap(limit, index).min(remaining);
            let entries = self
                .top_in_category(workspace_id, project_id, *category, take)
                .await?;
            results.extend(entries.into_iter().map(|entry| SearchResult { entry, rank: 0.0 }));
        }
        Ok(results)
    }
}
