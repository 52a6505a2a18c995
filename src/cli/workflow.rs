//! Workflow CLI commands
//!
//! - `conclave workflow templates`: list built-in and project templates
//! - `conclave workflow create`: instantiate a template as a plan
//! - `conclave workflow run`: execute a plan layer by layer
//! - `conclave workflow rollback`: reset a plan to its recovery point

use super::events::spawn_printer;
use super::WorkflowCommands;
use crate::app::App;
use anyhow::{Context, Result};
use conclave_core::model::{Plan, Project};
use conclave_core::store::ProjectStore;
use std::sync::Arc;
use tracing::info;

/// Run a workflow subcommand.
pub async fn run(cmd: WorkflowCommands, app: &App) -> Result<()> {
    match cmd {
        WorkflowCommands::Templates { project } => templates(app, project.as_deref()).await,
        WorkflowCommands::Create {
            project,
            template,
            message,
            title,
        } => create(app, &project, &template, &message, title.as_deref()).await,
        WorkflowCommands::Run { plan } => execute(app, &plan).await,
        WorkflowCommands::Rollback { plan } => rollback(app, &plan).await,
    }
}

async fn project_of(app: &App, plan: &Plan) -> Result<Project> {
    app.store
        .get_project(&plan.project_id)
        .await?
        .with_context(|| format!("Project not found: {}", plan.project_id))
}

fn print_plan(plan: &Plan) {
    println!("{}  {} [{}]", plan.id, plan.title, plan.status);
    let groups = plan
        .workflow_metadata
        .as_ref()
        .map(|m| m.parallel_groups.clone())
        .unwrap_or_default();
    for (layer, group) in groups.iter().enumerate() {
        for id in group {
            if let Some(step) = plan.step(id) {
                println!(
                    "  {layer}. {:<24} {:<13} {:<12} {}",
                    step.id, step.agent_kind, step.status, step.title
                );
            }
        }
    }
}

async fn templates(app: &App, project: Option<&str>) -> Result<()> {
    for template in app.workflows.list_templates(project).await? {
        println!(
            "{:<20} {:<12} {} ({} steps){}",
            template.id,
            template.category,
            template.name,
            template.steps.len(),
            if template.is_builtin { "" } else { " [custom]" }
        );
    }
    Ok(())
}

async fn create(
    app: &App,
    project_id: &str,
    template_id: &str,
    message: &str,
    title: Option<&str>,
) -> Result<()> {
    let project = app
        .store
        .get_project(project_id)
        .await?
        .with_context(|| format!("Project not found: {project_id}"))?;
    let plan = app
        .workflows
        .create_from_template(&project, template_id, message, title)
        .await?;
    print_plan(&plan);
    Ok(())
}

async fn execute(app: &App, plan_id: &str) -> Result<()> {
    let plan = app.workflows.get_plan(plan_id).await?;
    let project = project_of(app, &plan).await?;
    let executor = Arc::new(app.executor());
    let printer = spawn_printer(&app.events);

    let canceller = {
        let executor = executor.clone();
        let plan_id = plan_id.to_string();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Cancel requested");
                executor.cancel(&plan_id);
            }
        })
    };

    let outcome = executor.execute(plan, &project).await;
    canceller.abort();
    printer.abort();
    let outcome = outcome?;

    print_plan(&app.workflows.get_plan(plan_id).await?);
    println!(
        "Workflow {}: {} tokens, ${:.4}",
        outcome.status, outcome.tokens, outcome.cost_usd
    );
    Ok(())
}

async fn rollback(app: &App, plan_id: &str) -> Result<()> {
    let plan = app.workflows.get_plan(plan_id).await?;
    let project = project_of(app, &plan).await?;
    let plan = app.rollback().rollback(plan_id, &project).await?;
    print_plan(&plan);
    Ok(())
}
