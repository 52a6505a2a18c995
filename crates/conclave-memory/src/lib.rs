//! Conclave Memory: workspace knowledge store and search
//!
//! Stores freeform knowledge entries in SQLite, indexes them with FTS5 and
//! ranks them against task descriptions.
//!
//! # Architecture
//!
//! ```text
//! NewKnowledgeEntry ──► MemoryStore (SQLite) ──► memory_fts (FTS5)
//!                              │
//!                     search(query, intent)
//!                      ╱                 ╲
//!           bm25 + category boost    category fallback
//!                      ╲                 ╱
//!                    Vec<SearchResult> ──► format_for_context
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod search;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use format::{format_for_context, format_grouped};
pub use search::{
    build_fts_query, detect_task_intent, fallback_slot_cap, tokenize, TaskIntent,
    FALLBACK_SLOT_RATIOS,
};
pub use store::{MemoryStore, DEFAULT_CANDIDATE_LIMIT};
pub use types::{
    KnowledgeEntry, KnowledgeEntryUpdate, MemoryCategory, MemoryScope, NewKnowledgeEntry,
    SearchResult,
};
