use super::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Being written
    #[default]
    Drafting,
    /// Ready to execute
    Ready,
    /// Executing
    Executing,
    /// All reachable steps succeeded
    Completed,
    /// At least one step failed
    Failed,
    /// Abandoned
    Cancelled,
}

text_enum!(PlanStatus {
    Drafting => "drafting",
    Ready => "ready",
    Executing => "executing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started
    #[default]
    Pending,
    /// Executing
    InProgress,
    /// Succeeded
    Completed,
    /// Failed or blocked by a required gate
    Failed,
    /// Not executed because an upstream step failed
    Skipped,
}

text_enum!(StepStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

/// Rough effort estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Small
    Low,
    /// Moderate
    #[default]
    Medium,
    /// Large
    High,
}

/// What a quality gate checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityGateKind {
    /// Tests pass
    TestPass,
    /// Linter passes
    LintPass,
    /// Build succeeds
    BuildPass,
    /// Free-form check
    Custom,
}

/// Pass/fail check attached to a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    /// Gate kind
    #[serde(rename = "type")]
    pub kind: QualityGateKind,
    /// What is checked
    pub description: String,
    /// Whether failure blocks the workflow
    pub required: bool,
}

/// Outcome of a gate evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateResult {
    /// Step the gate belongs to
    pub step_id: String,
    /// Whether validation passed
    pub passed: bool,
    /// Joined issues or "All checks passed"
    pub output: String,
    /// Evaluated at
    pub timestamp: DateTime<Utc>,
}

/// Recovery point for a workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackInfo {
    /// Whether a recovery point is captured before execution
    pub enabled: bool,
    /// Checkpointed step at the time of capture
    pub last_good_step_id: Option<String>,
    /// Commit captured before the first step
    pub git_commit_before: Option<String>,
}

/// Workflow bookkeeping stored with a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Template the plan was created from
    pub template_id: Option<String>,
    /// Template display name
    pub template_name: Option<String>,
    /// Last completed step
    pub checkpoint_step_id: Option<String>,
    /// Topological layers of step IDs
    pub parallel_groups: Vec<Vec<String>>,
    /// Gate results keyed by step ID
    pub quality_gate_results: HashMap<String, QualityGateResult>,
    /// Rollback configuration and captured state
    pub rollback_info: Option<RollbackInfo>,
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step ID, unique within the plan
    pub id: String,
    /// Title
    pub title: String,
    /// Instructions for the agent
    pub description: String,
    /// Agent that runs the step
    pub agent_kind: AgentKind,
    /// Status
    pub status: StepStatus,
    /// Steps that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Effort estimate
    #[serde(default)]
    pub estimated_complexity: Complexity,
    /// Optional gate
    #[serde(default)]
    pub quality_gate: Option<QualityGate>,
    /// Outcome summary
    #[serde(default)]
    pub result_summary: Option<String>,
}

impl PlanStep {
    /// Create a pending step
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        agent_kind: AgentKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            agent_kind,
            status: StepStatus::Pending,
            dependencies: Vec::new(),
            estimated_complexity: Complexity::default(),
            quality_gate: None,
            result_summary: None,
        }
    }

    /// Set dependencies
    #[must_use]
    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.dependencies = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Attach a quality gate
    #[must_use]
    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.quality_gate = Some(gate);
        self
    }
}

/// A plan bound to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan ID
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Title
    pub title: String,
    /// Summary
    pub summary: Option<String>,
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// Status
    pub status: PlanStatus,
    /// Workflow bookkeeping, absent for ad-hoc plans
    pub workflow_metadata: Option<WorkflowMetadata>,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Updated at
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a drafting plan
    pub fn new(project_id: impl Into<String>, title: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            title: title.into(),
            summary: None,
            steps,
            status: PlanStatus::Drafting,
            workflow_metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Step by ID
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Mutable step by ID
    pub fn step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }
}
