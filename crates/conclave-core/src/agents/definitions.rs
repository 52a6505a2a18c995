//! Built-in sub-agent profiles

use crate::model::AgentKind;
use serde::{Deserialize, Serialize};

/// Which context blocks an agent receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextHints {
    /// Memory search results for the task
    pub memory: bool,
    /// PROJECT.md and CONVENTIONS.md
    pub workspace_files: bool,
    /// Rolling session summary
    pub summary: bool,
    /// Project settings digest
    pub project_context: bool,
    /// Recent chat messages
    pub conversation: bool,
}

impl ContextHints {
    /// Every block enabled
    pub const ALL: ContextHints = ContextHints {
        memory: true,
        workspace_files: true,
        summary: true,
        project_context: true,
        conversation: true,
    };

    /// Apply per-task overrides
    #[must_use]
    pub fn with_overrides(self, overrides: &ContextHintOverrides) -> Self {
        Self {
            memory: overrides.memory.unwrap_or(self.memory),
            workspace_files: overrides.workspace_files.unwrap_or(self.workspace_files),
            summary: overrides.summary.unwrap_or(self.summary),
            project_context: overrides.project_context.unwrap_or(self.project_context),
            conversation: overrides.conversation.unwrap_or(self.conversation),
        }
    }
}

/// Per-task overrides of an agent's default hints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextHintOverrides {
    /// Memory override
    pub memory: Option<bool>,
    /// Workspace files override
    pub workspace_files: Option<bool>,
    /// Summary override
    pub summary: Option<bool>,
    /// Project context override
    pub project_context: Option<bool>,
    /// Conversation override
    pub conversation: Option<bool>,
}

/// Capability profile of a sub-agent
#[derive(Debug, Clone, Copy)]
pub struct AgentDefinition {
    /// Agent kind
    pub kind: AgentKind,
    /// Display name
    pub name: &'static str,
    /// One-line description shown to the router
    pub description: &'static str,
    /// Tools the session may use
    pub allowed_tools: &'static [&'static str],
    /// Base system prompt
    pub system_prompt: &'static str,
    /// Default context blocks
    pub default_hints: ContextHints,
}

impl AgentDefinition {
    /// Allowed tools as owned strings for a session request
    #[must_use]
    pub fn tool_list(&self) -> Vec<String> {
        self.allowed_tools.iter().map(|t| (*t).to_string()).collect()
    }
}

const CODE_ANALYST: AgentDefinition = AgentDefinition {
    kind: AgentKind::CodeAnalyst,
    name: "Code Analyst",
    description: "Explores code, finds patterns, traces dependencies, and analyzes architecture.",
    allowed_tools: &["Read", "Grep", "Glob"],
    system_prompt: "You are a code analyst. Your role is to explore codebases, find patterns, \
trace dependencies, and provide detailed analysis. You have read-only access to the codebase. \
Provide clear, structured summaries of your findings.",
    default_hints: ContextHints::ALL,
};

const IMPLEMENTER: AgentDefinition = AgentDefinition {
    kind: AgentKind::Implementer,
    name: "Implementer",
    description: "Writes and modifies code, creates files, and makes edits.",
    allowed_tools: &["Read", "Edit", "Write", "Grep", "Glob", "Bash"],
    system_prompt: "You are an implementer. Your role is to write and modify code based on clear \
specifications. Follow existing code conventions. Make minimal, focused changes. \
Summarize what you changed and why.",
    default_hints: ContextHints::ALL,
};

const TEST_RUNNER: AgentDefinition = AgentDefinition {
    kind: AgentKind::TestRunner,
    name: "Test Runner",
    description: "Runs tests, analyzes failures, and reports results.",
    allowed_tools: &["Bash", "Read", "Grep", "Glob"],
    system_prompt: "You are a test runner. Your role is to run tests, analyze failures, and report \
results clearly. Include test output, pass/fail counts, and actionable information about failures.",
    default_hints: ContextHints {
        memory: false,
        workspace_files: true,
        summary: false,
        project_context: true,
        conversation: false,
    },
};

const RESEARCHER: AgentDefinition = AgentDefinition {
    kind: AgentKind::Researcher,
    name: "Researcher",
    description: "Searches external documentation, finds solutions, and gathers information.",
    allowed_tools: &["WebSearch", "WebFetch", "Read", "Grep", "Glob"],
    system_prompt: "You are a researcher. Your role is to search external documentation, find \
solutions to technical problems, and gather relevant information. Provide concise summaries \
with source references.",
    default_hints: ContextHints {
        memory: true,
        workspace_files: false,
        summary: false,
        project_context: true,
        conversation: false,
    },
};

/// All dispatchable agents, in router listing order
pub static AGENT_DEFINITIONS: [AgentDefinition; 4] = [CODE_ANALYST, IMPLEMENTER, TEST_RUNNER, RESEARCHER];

/// Profile for a sub-agent kind; `None` for the orchestrator
#[must_use]
pub fn agent_definition(kind: AgentKind) -> Option<&'static AgentDefinition> {
    AGENT_DEFINITIONS.iter().find(|d| d.kind == kind)
}
