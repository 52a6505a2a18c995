//! Orchestrator core structure
//!
//! Contains the main `Orchestrator` struct, its builder methods and the
//! cancellation entry points.

use crate::agents::AgentRunner;
use crate::event_bus::EventBus;
use crate::settings::SettingsToolLauncher;
use crate::store::DataStore;
use conclave_llm::CompletionService;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::OrchestratorConfig;
use super::extraction::KnowledgeExtractor;

/// Turn in flight for a project
#[derive(Debug, Clone)]
pub(crate) struct ActiveTurn {
    pub run_id: String,
    pub token: CancellationToken,
}

/// Routes user messages to sub-agents and assembles the answer
pub struct Orchestrator {
    pub(crate) completion: Arc<dyn CompletionService>,
    pub(crate) runner: AgentRunner,
    pub(crate) store: Arc<dyn DataStore>,
    pub(crate) events: EventBus,
    pub(crate) extractor: Option<Arc<dyn KnowledgeExtractor>>,
    pub(crate) config: OrchestratorConfig,
    /// Serves the settings tools to setup sessions
    pub(crate) settings_tools: Option<SettingsToolLauncher>,
    /// Turns in flight keyed by project ID
    pub(crate) active_turns: Arc<DashMap<String, ActiveTurn>>,
}

impl Orchestrator {
    /// Create a new orchestrator
    #[must_use]
    pub fn new(
        completion: Arc<dyn CompletionService>,
        runner: AgentRunner,
        store: Arc<dyn DataStore>,
        events: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            completion,
            runner,
            store,
            events,
            extractor: None,
            config,
            settings_tools: None,
            active_turns: Arc::new(DashMap::new()),
        }
    }

    /// Set the background knowledge extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn KnowledgeExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Give setup sessions the project settings tools
    #[must_use]
    pub fn with_settings_tools(mut self, launcher: SettingsToolLauncher) -> Self {
        self.settings_tools = Some(launcher);
        self
    }

    /// Get the agent runner
    #[must_use]
    pub fn runner(&self) -> &AgentRunner {
        &self.runner
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get the event bus
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Orchestrator run of the project's turn in flight
    #[must_use]
    pub fn current_run_id(&self, project_id: &str) -> Option<String> {
        self.active_turns.get(project_id).map(|t| t.run_id.clone())
    }

    /// Number of turns in flight
    #[must_use]
    pub fn active_turn_count(&self) -> usize {
        self.active_turns.len()
    }

    /// Cancel the project's turn: routing, every dispatched agent and
    /// synthesis. Returns false when no turn is running.
    pub fn interrupt(&self, project_id: &str) -> bool {
        if let Some((_, turn)) = self.active_turns.remove(project_id) {
            turn.token.cancel();
            info!(project_id = %project_id, run_id = %turn.run_id, "Turn interrupted");
            true
        } else {
            false
        }
    }

    /// Cancel one sub-agent without touching the rest of the turn.
    ///
    /// An agent that already finished has its status re-broadcast instead.
    pub async fn interrupt_agent(&self, run_id: &str) -> crate::Result<bool> {
        self.runner.interrupt(run_id).await
    }
}
