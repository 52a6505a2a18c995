//! Memory CLI commands
//!
//! - `conclave memory add`: file a knowledge entry
//! - `conclave memory list`: list workspace or project entries
//! - `conclave memory search`: rank entries against a query
//! - `conclave memory promote`: move an entry into project settings
//! - `conclave memory candidates`: entries that could be promoted

use super::MemoryCommands;
use crate::app::App;
use anyhow::{Context, Result};
use conclave_core::store::ProjectStore;
use conclave_memory::{KnowledgeEntry, MemoryCategory, NewKnowledgeEntry};

/// Run a memory subcommand.
pub async fn run(cmd: MemoryCommands, app: &App) -> Result<()> {
    match cmd {
        MemoryCommands::Add {
            category,
            key,
            content,
            project,
        } => add(app, &category, key, content, project).await,
        MemoryCommands::List { project } => list(app, project.as_deref()).await,
        MemoryCommands::Search {
            query,
            project,
            limit,
        } => search(app, &query, project.as_deref(), limit).await,
        MemoryCommands::Promote {
            entry,
            project,
            preview,
        } => promote(app, &entry, &project, preview).await,
        MemoryCommands::Candidates { project, limit } => candidates(app, &project, limit).await,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn print_entry(entry: &KnowledgeEntry) {
    let promoted = entry
        .promoted_to
        .as_deref()
        .map(|target| format!(" → {target}"))
        .unwrap_or_default();
    println!(
        "{}  [{}] {} (used {}){promoted}",
        entry.id, entry.category, entry.key, entry.use_count
    );
    println!("    {}", entry.content);
}

async fn workspace_of(app: &App, project_id: &str) -> Result<String> {
    let project = app
        .store
        .get_project(project_id)
        .await?
        .with_context(|| format!("Project not found: {project_id}"))?;
    Ok(project.workspace_id)
}

// ── Commands ─────────────────────────────────────────────────────────

async fn add(
    app: &App,
    category: &str,
    key: String,
    content: String,
    project: Option<String>,
) -> Result<()> {
    let category: MemoryCategory = category.parse()?;
    let mut new = NewKnowledgeEntry::new(&app.config.workspace_id, category, key, content);
    if let Some(project) = project {
        new = NewKnowledgeEntry {
            workspace_id: workspace_of(app, &project).await?,
            ..new.for_project(project)
        };
    }
    let entry = app.memory.create(new).await?;
    println!("{}", entry.id);
    Ok(())
}

async fn list(app: &App, project: Option<&str>) -> Result<()> {
    let entries = match project {
        Some(project) => app.memory.list_by_project(project).await?,
        None => app.memory.list_by_workspace(&app.config.workspace_id).await?,
    };
    if entries.is_empty() {
        println!("No memory entries.");
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

async fn search(app: &App, query: &str, project: Option<&str>, limit: u32) -> Result<()> {
    let workspace = match project {
        Some(project) => workspace_of(app, project).await?,
        None => app.config.workspace_id.clone(),
    };
    let results = app
        .memory
        .search(&workspace, project, query, None, limit)
        .await?;
    if results.is_empty() {
        println!("No matches.");
    }
    for result in &results {
        print!("{:>7.3}  ", result.rank);
        print_entry(&result.entry);
    }
    Ok(())
}

async fn promote(app: &App, entry_id: &str, project_id: &str, preview: bool) -> Result<()> {
    if preview {
        let preview = app.promotion.preview_promotion(entry_id, project_id).await?;
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }
    let result = app.promotion.execute_promotion(entry_id, project_id).await?;
    println!("Promoted to {}: {}", result.category, result.label);
    Ok(())
}

async fn candidates(app: &App, project_id: &str, limit: Option<u32>) -> Result<()> {
    let workspace = workspace_of(app, project_id).await?;
    let candidates = app
        .promotion
        .promotion_candidates(&workspace, project_id, limit)
        .await?;
    if candidates.is_empty() {
        println!("No promotion candidates.");
    }
    for candidate in &candidates {
        println!(
            "{} → {}: {}",
            candidate.entry.id, candidate.result.category, candidate.result.label
        );
    }
    Ok(())
}
