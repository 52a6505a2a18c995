//! Project CLI commands
//!
//! - `conclave project create`: create a project (optionally skipping setup)
//! - `conclave project list`: list projects
//! - `conclave project show`: print a project, its settings and budget

use super::ProjectCommands;
use crate::app::App;
use anyhow::{Context, Result};
use conclave_core::model::Project;
use conclave_core::store::ProjectStore;

/// Run a project subcommand.
pub async fn run(cmd: ProjectCommands, app: &App) -> Result<()> {
    match cmd {
        ProjectCommands::Create {
            title,
            dir,
            description,
            skip_setup,
        } => create(app, title, dir, description, skip_setup).await,
        ProjectCommands::List => list(app).await,
        ProjectCommands::Show { id } => show(app, &id).await,
    }
}

async fn create(
    app: &App,
    title: String,
    dir: Option<String>,
    description: Option<String>,
    skip_setup: bool,
) -> Result<()> {
    let mut project = Project::new(&app.config.workspace_id, title);
    project.description = description;
    if let Some(dir) = dir {
        let path = std::fs::canonicalize(&dir).with_context(|| format!("No such directory: {dir}"))?;
        project = project.with_directory(path.to_string_lossy());
    }
    project.setup_completed = skip_setup;
    app.store.create_project(&project).await?;

    println!("{}", project.id);
    if !skip_setup {
        eprintln!("Project created in setup mode. Start with: conclave chat {} \"hello\"", project.id);
    }
    Ok(())
}

async fn list(app: &App) -> Result<()> {
    let projects = app.store.list_projects().await?;
    if projects.is_empty() {
        println!("No projects. Create one with: conclave project create <title>");
        return Ok(());
    }
    for project in projects {
        println!(
            "{}  {:<30} {}",
            project.id,
            project.title,
            if project.setup_completed { "ready" } else { "setup" }
        );
    }
    Ok(())
}

async fn show(app: &App, id: &str) -> Result<()> {
    let project = app
        .store
        .get_project(id)
        .await?
        .with_context(|| format!("Project not found: {id}"))?;
    let budget = app.store.get_budget(id).await?;

    println!("{}", project.title);
    println!("  id:          {}", project.id);
    println!("  workspace:   {}", project.workspace_id);
    if let Some(dir) = &project.directory_path {
        println!("  directory:   {dir}");
    }
    for (label, value) in [
        ("description", &project.description),
        ("purpose", &project.purpose),
        ("language", &project.primary_language),
        ("architecture", &project.architecture_pattern),
    ] {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
    println!("  setup:       {}", if project.setup_completed { "completed" } else { "in progress" });
    println!("  usage:       {} tokens, ${:.4}", budget.tokens_used, budget.cost_usd);
    if !project.metadata.is_empty() {
        println!();
        println!("{}", serde_json::to_string_pretty(&project.metadata)?);
    }
    Ok(())
}
