//! Sub-agents
//!
//! Four tool-scoped agents the orchestrator and workflows dispatch to:
//!
//! ```text
//! code-analyst   Read Grep Glob
//! implementer    Read Edit Write Grep Glob Bash
//! test-runner    Bash Read Grep Glob
//! researcher     WebSearch WebFetch Read Grep Glob
//! ```
//!
//! [`AgentRunner`] executes one session per task and never propagates a
//! sub-agent failure to its caller.

mod definitions;
mod runner;
mod tool_tracker;

pub use definitions::{
    agent_definition, AgentDefinition, ContextHintOverrides, ContextHints, AGENT_DEFINITIONS,
};
pub(crate) use runner::SessionOutcome;
pub use runner::{AgentRunner, AgentTask, SubAgentResult, DEFAULT_MAX_TURNS, RESULT_SUMMARY_CHARS};
pub use tool_tracker::{ToolTracker, MAX_TOOL_OUTPUT_BYTES};

#[cfg(test)]
mod tests;
