use super::{AgentKind, Complexity, QualityGate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Template grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    /// New functionality
    Development,
    /// Fixes and cleanup
    Maintenance,
    /// Test work
    Testing,
    /// Docs
    Documentation,
}

text_enum!(TemplateCategory {
    Development => "development",
    Maintenance => "maintenance",
    Testing => "testing",
    Documentation => "documentation",
});

/// Step blueprint inside a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStep {
    /// Step ID, unique within the template
    pub id: String,
    /// Title
    pub title: String,
    /// Instructions
    pub description: String,
    /// Agent that runs the step
    pub agent_kind: AgentKind,
    /// Effort estimate
    #[serde(default)]
    pub estimated_complexity: Complexity,
    /// Steps that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Optional gate
    #[serde(default)]
    pub quality_gate: Option<QualityGate>,
}

/// Reusable named graph of steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Template ID
    pub id: String,
    /// Owning project; `None` for built-ins
    pub project_id: Option<String>,
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Category
    pub category: TemplateCategory,
    /// Steps
    pub steps: Vec<TemplateStep>,
    /// Built-ins cannot be modified or deleted
    pub is_builtin: bool,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Updated at
    pub updated_at: DateTime<Utc>,
}
