//! Conclave Core - Multi-agent orchestration engine
//!
//! This crate provides the orchestration logic behind the Conclave
//! assistant, including:
//! - Orchestrator: Routing a chat message to sub-agents and synthesizing the answer
//! - Agents: Tool-scoped sub-agent sessions with cancellation and tool tracking
//! - Context: Per-agent context packages with a per-turn fetch cache
//! - Knowledge: Memory/settings deduplication and memory promotion
//! - Settings: Category merge engine for project settings
//! - Workflow: Layered step graphs with quality gates and rollback
//! - Store: SQLite persistence for runs, projects, plans and templates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod context;
pub mod error;
pub mod event_bus;
pub mod knowledge;
pub mod model;
pub mod orchestrator;
pub mod settings;
pub mod store;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{AgentRunner, AgentTask, SubAgentResult};
pub use context::{ContextBuilder, ExecutionContextCache, SummaryCache};
pub use error::{format_error_for_chat, format_error_for_cli, Error, Result, UserFriendlyError};
pub use event_bus::{EventBus, MemoryAction, OrchestratorEvent};
pub use knowledge::{build_unified_knowledge, PromotionService};
pub use model::{
    AgentKind, AgentRun, Plan, PlanStatus, PlanStep, Project, RunStatus, StepStatus,
    WorkflowTemplate,
};
pub use orchestrator::{
    LlmKnowledgeExtractor, MessageOptions, Orchestrator, OrchestratorConfig, TurnOutcome,
};
pub use settings::{SettingsService, SettingsToolLauncher, SettingsTools, SettingsUpdate};
pub use store::{DataStore, SqliteStore};
pub use workflow::{GitVcs, RollbackManager, WorkflowExecutor, WorkflowManager, WorkflowOutcome};
