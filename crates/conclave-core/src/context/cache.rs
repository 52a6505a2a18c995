//! Per-turn cache of context blocks shared by every agent in the turn.

use super::project_context::build_project_context;
use super::summary::SummaryCache;
use super::workspace_files::WorkspaceFiles;
use crate::model::Project;
use crate::store::DataStore;
use conclave_llm::util::truncate_with_ellipsis;
use std::future::Future;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// Messages included in the recent conversation block
pub const CONVERSATION_MESSAGES: usize = 10;
/// Per-message character cap in the recent conversation block
pub const CONVERSATION_MESSAGE_CHARS: usize = 500;

/// A lazily fetched value that may legitimately be absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cached<T> {
    /// Not fetched yet
    #[default]
    NotFetched,
    /// Fetched; `None` means there was nothing to fetch
    Fetched(Option<T>),
}

impl<T: Clone> Cached<T> {
    /// Value if fetched
    #[must_use]
    pub fn get(&self) -> Option<Option<T>> {
        match self {
            Cached::NotFetched => None,
            Cached::Fetched(value) => Some(value.clone()),
        }
    }

    /// Whether a fetch already happened
    #[must_use]
    pub fn is_fetched(&self) -> bool {
        matches!(self, Cached::Fetched(_))
    }
}

async fn get_or_fetch<F, Fut>(slot: &Mutex<Cached<String>>, fetch: F) -> Option<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let mut guard = slot.lock().await;
    if let Some(value) = guard.get() {
        return value;
    }
    let value = fetch().await;
    *guard = Cached::Fetched(value.clone());
    value
}

/// Shared context for one orchestration turn or workflow run.
///
/// Project context, workspace files, session summary and conversation are
/// fetched at most once; only memory search differs per agent.
#[derive(Debug, Default)]
pub struct ExecutionContextCache {
    project: Mutex<Cached<String>>,
    workspace: Mutex<Cached<String>>,
    summary: Mutex<Cached<String>>,
    conversation: Mutex<Cached<String>>,
}

impl ExecutionContextCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Project settings digest
    pub async fn project_context(&self, project: &Project) -> Option<String> {
        get_or_fetch(&self.project, || async { build_project_context(project) }).await
    }

    /// PROJECT.md and CONVENTIONS.md of the project directory
    pub async fn workspace_context(&self, directory: Option<&Path>) -> Option<String> {
        get_or_fetch(&self.workspace, || async {
            let dir = directory?;
            match WorkspaceFiles::load(dir).await {
                Ok(files) => files.context(),
                Err(e) => {
                    debug!(error = %e, "Workspace files not available");
                    None
                }
            }
        })
        .await
    }

    /// Rolling session summary
    pub async fn session_summary(&self, summaries: &SummaryCache, project_id: &str) -> Option<String> {
        get_or_fetch(&self.summary, || async { summaries.summary(project_id) }).await
    }

    /// Last messages of the project, truncated
    pub async fn conversation(&self, store: &dyn DataStore, project_id: &str) -> Option<String> {
        get_or_fetch(&self.conversation, || async {
            match store.recent_messages(project_id, CONVERSATION_MESSAGES).await {
                Ok(messages) if !messages.is_empty() => Some(
                    messages
                        .iter()
                        .map(|m| {
                            format!(
                                "{}: {}",
                                m.role,
                                truncate_with_ellipsis(&m.content, CONVERSATION_MESSAGE_CHARS, "...")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "Conversation context not available");
                    None
                }
            }
        })
        .await
    }
}
