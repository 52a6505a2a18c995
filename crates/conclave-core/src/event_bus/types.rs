use crate::model::{
    AgentKind, ContextSection, MessageRole, PlanStatus, QualityGateResult, RunStatus, StepStatus,
    ToolStatus,
};
use chrono::{DateTime, Utc};
use conclave_memory::KnowledgeEntry;
use serde::Serialize;
use serde_json::{Map, Value};

/// What happened to a memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAction {
    /// Newly stored
    Created,
    /// Changed in place
    Updated,
}

impl MemoryAction {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// Events emitted by the orchestrator, agents, workflows and settings.
///
/// The `type` tag is the event name observers subscribe to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OrchestratorEvent {
    /// A run started
    #[serde(rename = "agent:started")]
    AgentStarted {
        /// Run ID
        agent_id: String,
        /// Project ID
        project_id: String,
        /// Agent kind
        agent_kind: AgentKind,
        /// Task description
        task: String,
    },
    /// A run reached (or re-reported) its terminal status
    #[serde(rename = "agent:stopped")]
    AgentStopped {
        /// Run ID
        agent_id: String,
        /// Project ID
        project_id: String,
        /// Status
        status: RunStatus,
    },
    /// Prompt sections assembled for a run
    #[serde(rename = "agent:context")]
    AgentContext {
        /// Run ID
        agent_id: String,
        /// Project ID
        project_id: String,
        /// Sections in prompt order
        sections: Vec<ContextSection>,
    },
    /// A tool call started
    #[serde(rename = "agent:tool")]
    AgentTool {
        /// Tool-use correlation ID
        id: String,
        /// Run ID
        agent_id: String,
        /// Tool name
        tool_name: String,
        /// Tool input
        input: serde_json::Value,
        /// Status
        status: ToolStatus,
        /// Started at
        timestamp: DateTime<Utc>,
    },
    /// A tool call finished
    #[serde(rename = "agent:tool_result")]
    AgentToolResult {
        /// Tool-use correlation ID
        tool_call_id: String,
        /// Run ID
        agent_id: String,
        /// Tool name
        tool_name: String,
        /// Truncated output
        output: String,
        /// Status
        status: ToolStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Streaming text from a run
    #[serde(rename = "chat:token")]
    ChatToken {
        /// Project ID
        project_id: String,
        /// Run ID
        agent_id: String,
        /// Text chunk
        token: String,
    },
    /// A complete chat message
    #[serde(rename = "chat:message")]
    ChatMessage {
        /// Project ID
        project_id: String,
        /// Author
        role: MessageRole,
        /// Text
        content: String,
    },
    /// A turn failed
    #[serde(rename = "chat:error")]
    ChatError {
        /// Project ID
        project_id: String,
        /// User-facing message
        message: String,
    },
    /// Plan status changed
    #[serde(rename = "plan:updated")]
    PlanUpdated {
        /// Plan ID
        plan_id: String,
        /// Project ID
        project_id: String,
        /// Status
        status: PlanStatus,
    },
    /// Step status changed
    #[serde(rename = "plan:step_updated")]
    PlanStepUpdated {
        /// Plan ID
        plan_id: String,
        /// Step ID
        step_id: String,
        /// Status
        status: StepStatus,
        /// Outcome summary
        result_summary: Option<String>,
    },
    /// A layer finished and the checkpoint moved
    #[serde(rename = "workflow:checkpoint")]
    WorkflowCheckpoint {
        /// Plan ID
        plan_id: String,
        /// Last completed step
        step_id: String,
    },
    /// A quality gate was evaluated
    #[serde(rename = "workflow:quality_gate")]
    WorkflowQualityGate {
        /// Plan ID
        plan_id: String,
        /// Result
        result: QualityGateResult,
    },
    /// Rollback finished
    #[serde(rename = "workflow:rollback_completed")]
    WorkflowRollbackCompleted {
        /// Plan ID
        plan_id: String,
        /// Whether the working tree was reverted
        success: bool,
    },
    /// A settings category changed
    #[serde(rename = "project:settings_updated")]
    ProjectSettingsUpdated {
        /// Project ID
        project_id: String,
        /// Category, `None` for project info fields
        category: Option<String>,
        /// New value of the category, or the changed project fields
        data: Value,
        /// Every settings category after the change
        full_metadata: Map<String, Value>,
        /// Changed top-level project fields
        #[serde(skip_serializing_if = "Option::is_none")]
        project_fields: Option<Map<String, Value>>,
    },
    /// Project setup was marked complete
    #[serde(rename = "project:setup_completed")]
    ProjectSetupCompleted {
        /// Project ID
        project_id: String,
    },
    /// A memory entry was created or changed
    #[serde(rename = "memory:updated")]
    MemoryUpdated {
        /// Entry as stored after the change
        entry: KnowledgeEntry,
        /// Created or updated
        action: MemoryAction,
    },
}

impl OrchestratorEvent {
    /// The event name carried in the `type` tag
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentStarted { .. } => "agent:started",
            Self::AgentStopped { .. } => "agent:stopped",
            Self::AgentContext { .. } => "agent:context",
            Self::AgentTool { .. } => "agent:tool",
            Self::AgentToolResult { .. } => "agent:tool_result",
            Self::ChatToken { .. } => "chat:token",
            Self::ChatMessage { .. } => "chat:message",
            Self::ChatError { .. } => "chat:error",
            Self::PlanUpdated { .. } => "plan:updated",
            Self::PlanStepUpdated { .. } => "plan:step_updated",
            Self::WorkflowCheckpoint { .. } => "workflow:checkpoint",
            Self::WorkflowQualityGate { .. } => "workflow:quality_gate",
            Self::WorkflowRollbackCompleted { .. } => "workflow:rollback_completed",
            Self::ProjectSettingsUpdated { .. } => "project:settings_updated",
            Self::ProjectSetupCompleted { .. } => "project:setup_completed",
            Self::MemoryUpdated { .. } => "memory:updated",
        }
    }
}
