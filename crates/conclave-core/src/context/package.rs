use super::cache::ExecutionContextCache;
use super::summary::SummaryCache;
use crate::agents::{agent_definition, ContextHintOverrides};
use crate::error::{Error, Result};
use crate::knowledge::build_unified_knowledge;
use crate::model::{AgentKind, ContextSection, Project};
use crate::store::DataStore;
use conclave_memory::{KnowledgeEntry, MemoryStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Memory entries injected into an agent prompt
pub const MAX_MEMORY_INJECTION_ENTRIES: u32 = 10;

/// Assembled prompt for one sub-agent
#[derive(Debug, Clone)]
pub struct ContextPackage {
    /// Full system prompt
    pub system_prompt: String,
    /// Agent the package was built for
    pub agent_kind: AgentKind,
    /// What went into the prompt, for observers
    pub sections: Vec<ContextSection>,
}

/// Builds agent prompts from project knowledge and session state
#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn DataStore>,
    memory: MemoryStore,
    summaries: SummaryCache,
}

impl ContextBuilder {
    /// Create a builder
    pub fn new(store: Arc<dyn DataStore>, memory: MemoryStore, summaries: SummaryCache) -> Self {
        Self {
            store,
            memory,
            summaries,
        }
    }

    /// Session summaries shared with the orchestrator
    #[must_use]
    pub fn summaries(&self) -> &SummaryCache {
        &self.summaries
    }

    async fn memory_entries(&self, project: &Project, task: &str) -> Vec<KnowledgeEntry> {
        match self
            .memory
            .search(
                &project.workspace_id,
                Some(&project.id),
                task,
                None,
                MAX_MEMORY_INJECTION_ENTRIES,
            )
            .await
        {
            Ok(results) => results.into_iter().map(|r| r.entry).collect(),
            Err(e) => {
                debug!(error = %e, "Memory search unavailable for context");
                Vec::new()
            }
        }
    }

    /// Build the system prompt for a sub-agent.
    ///
    /// Shared blocks come from `cache`; memory search runs per call because
    /// it depends on the task description.
    pub async fn build_context_package(
        &self,
        project: &Project,
        agent_kind: AgentKind,
        task: &str,
        overrides: Option<&ContextHintOverrides>,
        cache: &ExecutionContextCache,
    ) -> Result<ContextPackage> {
        let definition = agent_definition(agent_kind)
            .ok_or_else(|| Error::InvalidData(format!("no agent profile for {agent_kind}")))?;
        let hints = match overrides {
            Some(o) => definition.default_hints.with_overrides(o),
            None => definition.default_hints,
        };

        let mut prompt = String::from(definition.system_prompt);
        let mut sections = vec![
            ContextSection::new("System Prompt", definition.system_prompt),
            ContextSection::new("Task", task),
        ];
        prompt.push_str(&format!("\n\n## Your Task\n{task}"));

        // ── Project knowledge ───────────────────────────────────
        if hints.project_context || hints.memory {
            let settings = if hints.project_context {
                cache.project_context(project).await
            } else {
                None
            };
            let entries = if hints.memory {
                self.memory_entries(project, task).await
            } else {
                Vec::new()
            };
            let unified = build_unified_knowledge(
                settings.as_deref(),
                &entries,
                &project.metadata,
                project.updated_at,
            );
            if !unified.is_empty() {
                prompt.push_str(&format!("\n\n## Project Knowledge\n{unified}"));
            }
            sections.push(ContextSection::new("Project Knowledge", unified));
        } else {
            sections.push(ContextSection::excluded("Project Knowledge"));
        }

        // ── Workspace files ─────────────────────────────────────
        if hints.workspace_files {
            let dir = project.directory_path.as_deref().map(Path::new);
            let content = cache.workspace_context(dir).await.unwrap_or_default();
            if !content.is_empty() {
                prompt.push_str(&format!("\n\n## Workspace Files\n{content}"));
            }
            sections.push(ContextSection::new("Workspace Files", content));
        } else {
            sections.push(ContextSection::excluded("Workspace Files"));
        }

        // ── Session state ───────────────────────────────────────
        if hints.summary {
            let content = cache
                .session_summary(&self.summaries, &project.id)
                .await
                .unwrap_or_default();
            if !content.is_empty() {
                prompt.push_str(&format!("\n\n## Session State\n{content}"));
            }
            sections.push(ContextSection::new("Session Summary", content));
        } else {
            sections.push(ContextSection::excluded("Session Summary"));
        }

        // ── Conversation ────────────────────────────────────────
        if hints.conversation {
            let content = cache
                .conversation(self.store.as_ref(), &project.id)
                .await
                .unwrap_or_default();
            if !content.is_empty() {
                prompt.push_str(&format!("\n\n## Recent Conversation\n{content}"));
            }
            sections.push(ContextSection::new("Conversation", content));
        } else {
            sections.push(ContextSection::excluded("Conversation"));
        }

        Ok(ContextPackage {
            system_prompt: prompt,
            agent_kind,
            sections,
        })
    }
}
