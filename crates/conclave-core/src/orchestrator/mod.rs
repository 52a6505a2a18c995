//! Orchestrator - per-message turn pipeline
//!
//! This module ties the router, the agent runner and the synthesizer
//! together for one user message at a time.
//!
//! # Module Structure
//!
//! - `config`: Configuration types (OrchestratorConfig, MessageOptions)
//! - `core`: Orchestrator struct, builder methods and interrupts
//! - `process`: Main turn loop
//! - `routing`: Routing prompt and reply parsing
//! - `synthesis`: Combining several agent outputs
//! - `setup`: Setup-mode sessions for new projects
//! - `extraction`: Background knowledge extraction

mod config;
mod core;
mod extraction;
mod process;
mod routing;
mod setup;
mod synthesis;

#[cfg(test)]
mod tests;

use crate::agents::SubAgentResult;
use crate::model::RunStatus;

// Re-export public types
pub use config::{MessageOptions, OrchestratorConfig};
pub use core::Orchestrator;
#[cfg(test)]
pub use extraction::MockKnowledgeExtractor;
pub use extraction::{
    spawn_extraction, ExtractionComplexity, KnowledgeExtractor, LlmKnowledgeExtractor,
};
pub use routing::{
    build_routing_prompt, format_routing_history, parse_route_response, strip_code_fence,
    PlannedAgent, RouteDecision,
};
pub use setup::{build_setup_progress, build_setup_prompt, SETUP_HISTORY_MESSAGES};
pub use synthesis::{build_synthesis_prompt, labelled_concatenation, NO_OUTPUT_MESSAGE};

/// Result of one orchestrator turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Orchestrator run ID
    pub run_id: String,
    /// Terminal status of the orchestrator run
    pub status: RunStatus,
    /// Final (or partial) assistant response
    pub response: String,
    /// Sub-agent results in dispatch order
    pub sub_agents: Vec<SubAgentResult>,
}
