//! Context assembly for agent prompts
//!
//! ```text
//! Project ──► build_project_context ─┐
//! MemoryStore.search(task) ──────────┼─► build_unified_knowledge ─┐
//! WorkspaceFiles (.conclave/*.md) ───┤                            ├─► ContextPackage
//! SummaryCache ──────────────────────┤                            │
//! recent messages ───────────────────┴────────────────────────────┘
//! ```
//!
//! Everything except the memory search is cached per turn in an
//! [`ExecutionContextCache`].

mod cache;
mod package;
mod project_context;
mod summary;
mod workspace_files;

pub use cache::{Cached, ExecutionContextCache, CONVERSATION_MESSAGES, CONVERSATION_MESSAGE_CHARS};
pub use package::{ContextBuilder, ContextPackage, MAX_MEMORY_INJECTION_ENTRIES};
pub use project_context::build_project_context;
pub use summary::{ProjectSummary, SummaryCache, MAX_SUMMARY_LENGTH};
pub use workspace_files::{WorkspaceFiles, CONVENTIONS_FILE, PROJECT_FILE, WORKSPACE_DIR};

#[cfg(test)]
mod tests;
