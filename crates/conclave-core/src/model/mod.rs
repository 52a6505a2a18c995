//! Data model shared by the orchestrator, workflows and persistence.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum
/// from a fixed variant-to-text table.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable text form used in storage and events
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(crate::Error::InvalidData(format!(
                        concat!("unknown ", stringify!($ty), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

mod plan;
mod project;
mod run;
mod template;

pub use plan::{
    Complexity, Plan, PlanStatus, PlanStep, QualityGate, QualityGateKind, QualityGateResult,
    RollbackInfo, StepStatus, WorkflowMetadata,
};
pub use project::{ContextSection, MessageRole, Project, ProjectBudget, StoredMessage};
pub use run::{AgentKind, AgentRun, RunStatus, ToolInvocation, ToolStatus};
pub use template::{TemplateCategory, TemplateStep, WorkflowTemplate};
