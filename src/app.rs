//! Service wiring shared by the CLI commands

use crate::config::AppConfig;
use anyhow::{Context, Result};
use conclave_core::{
    AgentRunner, ContextBuilder, EventBus, GitVcs, LlmKnowledgeExtractor, Orchestrator,
    PromotionService, RollbackManager, SettingsService, SettingsToolLauncher, SqliteStore,
    SummaryCache, WorkflowExecutor, WorkflowManager,
};
use conclave_llm::{resolve_model_id, AnthropicClient, ClaudeCliRunner, CompletionService};
use conclave_memory::MemoryStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Stores and services for one CLI invocation
pub struct App {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub memory: MemoryStore,
    pub events: EventBus,
    pub settings: SettingsService,
    pub promotion: PromotionService,
    pub workflows: WorkflowManager,
}

impl App {
    /// Open the databases and seed built-in templates
    pub async fn init(config: AppConfig) -> Result<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let store = Arc::new(
            SqliteStore::from_path(&data_dir.join("conclave.db"))
                .await
                .context("Failed to open conclave database")?,
        );
        let memory = MemoryStore::from_path(&data_dir.join("memory.db"))
            .await
            .context("Failed to open memory database")?;
        let events = EventBus::new(config.event_capacity);
        debug!(data_dir = %data_dir.display(), "Databases opened");

        let settings = SettingsService::new(store.clone(), memory.clone(), events.clone())
            .with_projects_root(config.orchestrator.projects_root.clone());
        let promotion = PromotionService::new(store.clone(), memory.clone(), events.clone());
        let workflows = WorkflowManager::new(store.clone(), events.clone());
        workflows.seed_builtins().await?;

        Ok(Self {
            config,
            store,
            memory,
            events,
            settings,
            promotion,
            workflows,
        })
    }

    /// Runner driving the `claude` CLI
    pub fn agent_runner(&self) -> AgentRunner {
        let sessions = Arc::new(ClaudeCliRunner::new(self.config.claude.clone()));
        let context = ContextBuilder::new(self.store.clone(), self.memory.clone(), SummaryCache::new());
        AgentRunner::new(sessions, self.store.clone(), context, self.events.clone())
            .with_default_model(Some(self.config.orchestrator.model.clone()))
            .with_max_turns(self.config.agents.max_turns)
    }

    /// Orchestrator with knowledge extraction. Needs `ANTHROPIC_API_KEY`.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let completion: Arc<dyn CompletionService> = Arc::new(
            AnthropicClient::from_env().context("Chat needs an Anthropic API key")?,
        );
        let extractor = LlmKnowledgeExtractor::new(
            completion.clone(),
            self.memory.clone(),
            self.events.clone(),
            resolve_model_id(Some("haiku")),
        );
        let exe = std::env::current_exe().context("Failed to locate the conclave executable")?;
        let tools = SettingsToolLauncher::new(exe.display().to_string(), vec!["mcp".to_string()]);
        info!(model = %self.config.orchestrator.model, "Orchestrator ready");

        Ok(Orchestrator::new(
            completion,
            self.agent_runner(),
            self.store.clone(),
            self.events.clone(),
            self.config.orchestrator.clone(),
        )
        .with_extractor(Arc::new(extractor))
        .with_settings_tools(tools))
    }

    /// Executor with git recovery points when enabled
    pub fn executor(&self) -> WorkflowExecutor {
        let executor = WorkflowExecutor::new(self.agent_runner(), self.store.clone(), self.events.clone())
            .with_model(Some(self.config.orchestrator.model.clone()));
        if self.config.workflow.rollback {
            executor.with_rollback(self.rollback())
        } else {
            executor
        }
    }

    /// Rollback through git
    pub fn rollback(&self) -> RollbackManager {
        RollbackManager::new(Arc::new(GitVcs), self.store.clone(), self.events.clone())
    }
}
