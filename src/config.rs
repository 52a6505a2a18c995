//! Application configuration
//!
//! Sources, lowest priority first: the embedded `config/default.toml`,
//! `config/default` and `config/local` next to the working directory, the
//! file named by `CONCLAVE_ENV`, then `CONCLAVE_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use conclave_core::OrchestratorConfig;
use conclave_llm::ClaudeCliConfig;
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Workspace for new projects and memory entries
    pub workspace_id: String,
    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub claude: ClaudeCliConfig,
}

fn default_event_capacity() -> usize {
    1024
}

/// Log output
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_filter() -> String {
    "conclave=info,conclave_core=info".to_string()
}

/// Sub-agent limits
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    /// Agent turn cap
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> u32 {
    conclave_core::agents::DEFAULT_MAX_TURNS
}

/// Workflow execution
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Capture recovery points before execution
    #[serde(default = "default_true")]
    pub rollback: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { rollback: true }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Directory holding the databases
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("conclave"),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("CONCLAVE_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        // 3. Environment variables (highest priority)
        // prefix_separator("_") makes CONCLAVE_ORCHESTRATOR__MODEL work.
        .add_source(
            Environment::with_prefix("CONCLAVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut app: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    app.orchestrator.projects_root = app
        .orchestrator
        .projects_root
        .take()
        .map(|p| expand_home(&p.to_string_lossy()));
    Ok(app)
}
