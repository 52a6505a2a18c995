//! Template CRUD and plan instantiation

use super::graph::compute_parallel_groups;
use super::templates::builtin_templates;
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{
    AgentKind, Plan, PlanStatus, PlanStep, Project, RollbackInfo, TemplateCategory, TemplateStep,
    WorkflowMetadata, WorkflowTemplate,
};
use crate::store::DataStore;
use chrono::Utc;
use conclave_llm::util::truncate_chars;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const TITLE_MESSAGE_CHARS: usize = 80;

/// Fields of a custom template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInput {
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Category
    pub category: TemplateCategory,
    /// Steps
    pub steps: Vec<TemplateStep>,
}

/// Partial update of a custom template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<TemplateCategory>,
    /// New steps
    pub steps: Option<Vec<TemplateStep>>,
}

/// Manages workflow templates and the plans created from them
#[derive(Clone)]
pub struct WorkflowManager {
    store: Arc<dyn DataStore>,
    events: EventBus,
}

impl WorkflowManager {
    /// Create a manager
    pub fn new(store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Insert or refresh the built-in templates. Safe to call on every start.
    pub async fn seed_builtins(&self) -> Result<usize> {
        let templates = builtin_templates();
        for template in &templates {
            self.store.upsert_template(template).await?;
        }
        info!(count = templates.len(), "Built-in workflow templates seeded");
        Ok(templates.len())
    }

    /// Built-ins plus the project's own templates
    pub async fn list_templates(&self, project_id: Option<&str>) -> Result<Vec<WorkflowTemplate>> {
        self.store.list_templates(project_id).await
    }

    /// Template by ID
    pub async fn get_template(&self, id: &str) -> Result<WorkflowTemplate> {
        self.store
            .get_template(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("template {id}")))
    }

    /// Create a custom template for a project
    pub async fn create_template(&self, project_id: &str, input: TemplateInput) -> Result<WorkflowTemplate> {
        validate_steps(&input.steps)?;
        let now = Utc::now();
        let template = WorkflowTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: Some(project_id.to_string()),
            name: input.name,
            description: input.description,
            category: input.category,
            steps: input.steps,
            is_builtin: false,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert_template(&template).await?;
        info!(template_id = %template.id, project_id = %project_id, "Custom workflow template created");
        Ok(template)
    }

    /// Update a custom template
    pub async fn update_template(&self, id: &str, update: TemplateUpdate) -> Result<WorkflowTemplate> {
        let mut template = self.get_template(id).await?;
        if template.is_builtin {
            return Err(Error::Workflow("Cannot edit built-in templates".to_string()));
        }
        if let Some(steps) = update.steps {
            validate_steps(&steps)?;
            template.steps = steps;
        }
        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(description) = update.description {
            template.description = description;
        }
        if let Some(category) = update.category {
            template.category = category;
        }
        template.updated_at = Utc::now();
        self.store.upsert_template(&template).await?;
        info!(template_id = %id, "Workflow template updated");
        Ok(template)
    }

    /// Delete a custom template
    pub async fn delete_template(&self, id: &str) -> Result<()> {
        let template = self.get_template(id).await?;
        if template.is_builtin {
            return Err(Error::Workflow("Cannot delete built-in templates".to_string()));
        }
        self.store.delete_template(id).await?;
        info!(template_id = %id, "Workflow template deleted");
        Ok(())
    }

    /// Instantiate a template as a ready plan for `project`.
    ///
    /// Every step description carries the user's message as context.
    pub async fn create_from_template(
        &self,
        project: &Project,
        template_id: &str,
        user_message: &str,
        custom_title: Option<&str>,
    ) -> Result<Plan> {
        let template = self.get_template(template_id).await?;
        let parallel_groups = compute_parallel_groups(&template.steps)?;

        let steps = template
            .steps
            .iter()
            .map(|s| PlanStep {
                estimated_complexity: s.estimated_complexity,
                dependencies: s.dependencies.clone(),
                quality_gate: s.quality_gate.clone(),
                ..PlanStep::new(
                    &s.id,
                    &s.title,
                    format!("{}\n\nUser context: {user_message}", s.description),
                    s.agent_kind,
                )
            })
            .collect();

        let title = custom_title.map(str::to_string).unwrap_or_else(|| {
            format!(
                "{}: {}",
                template.name,
                truncate_chars(user_message, TITLE_MESSAGE_CHARS)
            )
        });

        let mut plan = Plan::new(&project.id, title, steps);
        plan.summary = Some(template.description.clone());
        plan.status = PlanStatus::Ready;
        plan.workflow_metadata = Some(WorkflowMetadata {
            template_id: Some(template.id.clone()),
            template_name: Some(template.name.clone()),
            parallel_groups,
            rollback_info: Some(RollbackInfo {
                enabled: true,
                ..RollbackInfo::default()
            }),
            ..WorkflowMetadata::default()
        });
        self.store.create_plan(&plan).await?;

        self.events.publish(OrchestratorEvent::PlanUpdated {
            plan_id: plan.id.clone(),
            project_id: project.id.clone(),
            status: plan.status,
        });
        info!(plan_id = %plan.id, template_id = %template.id, "Plan created from template");
        Ok(plan)
    }

    /// Plan by ID
    pub async fn get_plan(&self, id: &str) -> Result<Plan> {
        self.store
            .get_plan(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("plan {id}")))
    }

    /// Plans of a project, newest first
    pub async fn list_plans(&self, project_id: &str) -> Result<Vec<Plan>> {
        self.store.list_plans(project_id).await
    }
}

fn validate_steps(steps: &[TemplateStep]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::Workflow("a template needs at least one step".to_string()));
    }
    if let Some(step) = steps
        .iter()
        .find(|s| !AgentKind::SUB_AGENTS.contains(&s.agent_kind))
    {
        return Err(Error::Workflow(format!(
            "step {} cannot run as {}",
            step.id, step.agent_kind
        )));
    }
    compute_parallel_groups(steps).map(|_| ())
}
