//! Orchestrator configuration
//!
//! Contains configuration types for the orchestrator:
//! - `OrchestratorConfig` for pipeline limits and thresholds
//! - `MessageOptions` for a single user message

use conclave_llm::DEFAULT_MODEL_ALIAS;
use serde::Deserialize;
use std::path::PathBuf;

/// Options for one user message
#[derive(Debug, Clone)]
pub struct MessageOptions {
    /// Persist the user message (false for auto-triggered turns)
    pub persist: bool,
    /// Model alias for this turn
    pub model: Option<String>,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            persist: true,
            model: None,
        }
    }
}

impl MessageOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific model alias
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Do not store the user message
    #[must_use]
    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Default model alias
    pub model: String,
    /// Messages of history given to the router
    pub routing_history: usize,
    /// Characters kept per routed history message
    pub routing_message_chars: usize,
    /// Max tokens for the routing completion
    pub routing_max_tokens: u32,
    /// Max tokens for the synthesis completion
    pub synthesis_max_tokens: u32,
    /// Minimum response length that triggers knowledge extraction
    pub extraction_threshold: usize,
    /// Response length above which extraction runs at medium effort
    pub medium_complexity_threshold: usize,
    /// Per-project token budget (0 = unlimited)
    pub token_budget: u64,
    /// Turn cap for setup sessions
    pub setup_max_turns: u32,
    /// Root directory for new projects, mentioned in the setup prompt
    pub projects_root: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_ALIAS.to_string(),
            routing_history: 20,
            routing_message_chars: 300,
            routing_max_tokens: 4096,
            synthesis_max_tokens: 4096,
            extraction_threshold: 100,
            medium_complexity_threshold: 3000,
            token_budget: 0,
            setup_max_turns: 30,
            projects_root: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default model alias
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-project token budget
    #[must_use]
    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.token_budget = budget;
        self
    }

    /// Set the projects root directory
    #[must_use]
    pub fn with_projects_root(mut self, root: Option<PathBuf>) -> Self {
        self.projects_root = root;
        self
    }
}
