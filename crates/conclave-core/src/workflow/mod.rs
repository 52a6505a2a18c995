//! Workflows - fixed step graphs executed by sub-agents
//!
//! A workflow is a [`Plan`](crate::model::Plan) instantiated from a
//! template. Its steps are layered by dependency, each layer runs
//! concurrently, and quality gates decide whether execution advances.
//!
//! # Module Structure
//!
//! - `graph`: Kahn layering of step dependencies
//! - `validate`: Output heuristics per agent kind
//! - `executor`: Layer loop, gates and checkpoints
//! - `rollback`: Recovery points through a `Vcs`
//! - `templates`: Built-in templates
//! - `manager`: Template CRUD and plan creation

mod executor;
mod graph;
mod manager;
mod rollback;
mod templates;
mod validate;


pub use executor::{step_task, WorkflowExecutor, WorkflowOutcome};
pub use graph::{compute_parallel_groups, StepNode};
pub use manager::{TemplateInput, TemplateUpdate, WorkflowManager};
#[cfg(test)]
pub use rollback::MockVcs;
pub use rollback::{GitVcs, RollbackManager, Vcs};
pub use templates::{builtin_templates, BUILTIN_TEMPLATE_IDS};
pub use validate::{validate_step_output, ValidationResult};
