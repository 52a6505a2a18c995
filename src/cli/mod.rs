//! CLI module for Conclave
//!
//! Provides commands:
//! - `project`: Create, list and inspect projects
//! - `chat`: Send one message through the orchestrator
//! - `memory`: Manage workspace knowledge and promotions
//! - `settings`: Read and update project settings
//! - `workflow`: Templates, plan creation, execution and rollback
//! - `mcp`: Settings tool server for setup sessions (hidden)

use crate::app::App;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod events;
pub mod mcp;
pub mod memory;
pub mod project;
pub mod settings;
pub mod workflow;

/// Conclave multi-agent assistant CLI
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Multi-agent chat orchestrator for software projects")]
#[command(version)]
pub struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Send a message to a project
    Chat {
        /// Project ID
        project: String,
        /// Message text
        message: String,
        /// Model alias (sonnet, opus, haiku)
        #[arg(long)]
        model: Option<String>,
    },
    /// Manage workspace memory
    #[command(subcommand)]
    Memory(MemoryCommands),
    /// Read and update project settings
    #[command(subcommand)]
    Settings(SettingsCommands),
    /// Run workflows
    #[command(subcommand)]
    Workflow(WorkflowCommands),
    /// Serve project settings tools over MCP stdio (launched by setup sessions)
    #[command(hide = true)]
    Mcp {
        /// Project the tools act on
        #[arg(long)]
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        /// Title
        title: String,
        /// Working directory
        #[arg(long)]
        dir: Option<String>,
        /// Short description
        #[arg(long)]
        description: Option<String>,
        /// Skip the setup conversation
        #[arg(long)]
        skip_setup: bool,
    },
    /// List projects
    List,
    /// Show a project with its settings and budget
    Show {
        /// Project ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Add an entry
    Add {
        /// Category (architecture, convention, decision, fact, issue)
        #[arg(long)]
        category: String,
        /// Short label
        #[arg(long)]
        key: String,
        /// Entry text
        content: String,
        /// Source project
        #[arg(long)]
        project: Option<String>,
    },
    /// List entries of the workspace or a project
    List {
        /// Project ID
        #[arg(long)]
        project: Option<String>,
    },
    /// Rank entries against a query
    Search {
        /// Query text
        query: String,
        /// Project ID
        #[arg(long)]
        project: Option<String>,
        /// Maximum results
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Promote an entry into project settings
    Promote {
        /// Entry ID
        entry: String,
        /// Target project
        project: String,
        /// Show what would change without writing
        #[arg(long)]
        preview: bool,
    },
    /// Entries that could be promoted into a project's settings
    Candidates {
        /// Target project
        project: String,
        /// Maximum entries considered
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print settings, one category or all
    Get {
        /// Project ID
        project: String,
        /// Category
        category: Option<String>,
    },
    /// Update a category with JSON data
    Update {
        /// Project ID
        project: String,
        /// Category
        category: String,
        /// JSON value
        data: String,
        /// merge, replace or remove
        #[arg(long, default_value = "merge")]
        mode: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// List templates
    Templates {
        /// Include a project's custom templates
        #[arg(long)]
        project: Option<String>,
    },
    /// Create a plan from a template
    Create {
        /// Project ID
        project: String,
        /// Template ID
        template: String,
        /// What the workflow should achieve
        message: String,
        /// Plan title
        #[arg(long)]
        title: Option<String>,
    },
    /// Execute a plan
    Run {
        /// Plan ID
        plan: String,
    },
    /// Reset a plan and its working tree to the recovery point
    Rollback {
        /// Plan ID
        plan: String,
    },
}

/// Run the CLI command
pub async fn run(command: Commands, app: App) -> anyhow::Result<()> {
    match command {
        Commands::Project(cmd) => project::run(cmd, &app).await,
        Commands::Chat {
            project,
            message,
            model,
        } => chat::run(&app, &project, &message, model).await,
        Commands::Memory(cmd) => memory::run(cmd, &app).await,
        Commands::Settings(cmd) => settings::run(cmd, &app).await,
        Commands::Workflow(cmd) => workflow::run(cmd, &app).await,
        Commands::Mcp { project } => mcp::run(&project, &app).await,
    }
}
