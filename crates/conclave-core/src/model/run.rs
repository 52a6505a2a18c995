use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of agent a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// Top-level router and synthesizer
    Orchestrator,
    /// Read-only codebase analysis
    CodeAnalyst,
    /// Code changes
    Implementer,
    /// Test execution
    TestRunner,
    /// Web and documentation research
    Researcher,
}

text_enum!(AgentKind {
    Orchestrator => "orchestrator",
    CodeAnalyst => "code-analyst",
    Implementer => "implementer",
    TestRunner => "test-runner",
    Researcher => "researcher",
});

impl AgentKind {
    /// Agents the orchestrator can dispatch to
    pub const SUB_AGENTS: [AgentKind; 4] = [
        AgentKind::CodeAnalyst,
        AgentKind::Implementer,
        AgentKind::TestRunner,
        AgentKind::Researcher,
    ];

    /// Whether the agent only reads the workspace
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, AgentKind::CodeAnalyst | AgentKind::Researcher)
    }
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, not yet started
    #[default]
    Idle,
    /// Executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped by cancellation
    Interrupted,
}

text_enum!(RunStatus {
    Idle => "idle",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Interrupted => "interrupted",
});

impl RunStatus {
    /// Whether the status is final
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Interrupted
        )
    }

    /// Whether moving to `next` keeps the lifecycle monotonic
    #[must_use]
    pub fn can_transition(self, next: RunStatus) -> bool {
        match self {
            RunStatus::Idle => next != RunStatus::Idle,
            RunStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// One invocation of a sub-agent or the orchestrator itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    /// Run ID
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Orchestrator run that dispatched this one
    pub parent_run_id: Option<String>,
    /// Agent kind
    pub agent_kind: AgentKind,
    /// Lifecycle status
    pub status: RunStatus,
    /// Model identifier
    pub model: String,
    /// Task description
    pub task: String,
    /// Full response text
    pub response_text: Option<String>,
    /// Short result summary
    pub result_summary: Option<String>,
    /// Accumulated cost in USD
    pub cost_usd: f64,
    /// Accumulated input tokens
    pub input_tokens: u64,
    /// Accumulated output tokens
    pub output_tokens: u64,
    /// Started at
    pub started_at: Option<DateTime<Utc>>,
    /// Completed at
    pub completed_at: Option<DateTime<Utc>>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl AgentRun {
    /// Create an idle run
    pub fn new(
        project_id: impl Into<String>,
        agent_kind: AgentKind,
        model: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            parent_run_id: None,
            agent_kind,
            status: RunStatus::Idle,
            model: model.into(),
            task: task.into(),
            response_text: None,
            result_summary: None,
            cost_usd: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the dispatching orchestrator run
    #[must_use]
    pub fn with_parent(mut self, parent_run_id: Option<String>) -> Self {
        self.parent_run_id = parent_run_id;
        self
    }

    /// Move to `running`. Returns false when the transition is not allowed.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition(RunStatus::Running) {
            return false;
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Set the terminal status once. Returns false when already terminal.
    pub fn finish(&mut self, status: RunStatus) -> bool {
        if !status.is_terminal() || !self.status.can_transition(status) {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Input plus output tokens
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Status of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// In flight
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

text_enum!(ToolStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

/// One tool call made by a running agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation ID
    pub id: String,
    /// Owning run
    pub run_id: String,
    /// Tool name
    pub tool_name: String,
    /// Serialized input
    pub input: String,
    /// Serialized output, set on completion
    pub output: Option<String>,
    /// Status
    pub status: ToolStatus,
    /// Started at
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds, set on completion
    pub duration_ms: Option<u64>,
}
