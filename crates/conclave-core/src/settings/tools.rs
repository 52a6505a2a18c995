//! Settings operations as agent tools
//!
//! Setup sessions reach the [`SettingsService`] through an MCP server named
//! [`SETTINGS_SERVER_NAME`]. This module owns the tool definitions and the
//! dispatch of a tool call onto the service for one project; the stdio
//! transport lives in the binary.

use super::directory::DirectorySetup;
use super::merge::UpdateMode;
use super::service::{ProjectInfoUpdate, SettingsService, SettingsUpdate};
use crate::error::{Error, Result};
use conclave_llm::McpServer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

/// MCP server name the settings tools are registered under
pub const SETTINGS_SERVER_NAME: &str = "project-settings";

/// One tool as advertised by `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Text handed back to the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    /// Reply text
    pub text: String,
    /// Whether the call failed
    pub is_error: bool,
}

impl ToolReply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// The settings tools in the order they are advertised
#[must_use]
pub fn settings_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_project_settings",
            description: "Read current project settings. Omit category to get all settings, or provide a category name to get one section.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Settings category to read (e.g. \"techStack\", \"git\", \"codingStandards\"). Omit to get all."
                    }
                }
            }),
        },
        ToolDefinition {
            name: "update_project_settings",
            description: "Update one project settings category. Arrays merge by name/id, objects merge shallowly, primitives are replaced. After setup is completed, overlapping categories (codingStandards, designPatterns, errorHandling, namingConventions, knownIssues, adrs, domainConcepts) become memory entries instead.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Settings category to update (e.g. \"techStack\", \"git\", \"packageManager\", \"tags\", \"testing\")."
                    },
                    "data": {
                        "description": "Items to add or update, fields to merge, or the new primitive value."
                    },
                    "merge_mode": {
                        "type": "string",
                        "enum": ["merge", "replace", "remove"],
                        "default": "merge"
                    }
                },
                "required": ["category", "data"]
            }),
        },
        ToolDefinition {
            name: "set_project_info",
            description: "Update top-level project fields: title, description, purpose, primary language or architecture pattern.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "purpose": {"type": "string"},
                    "primaryLanguage": {"type": "string"},
                    "architecturePattern": {"type": "string"}
                }
            }),
        },
        ToolDefinition {
            name: "setup_project_directory",
            description: "Set up the project working directory: create a new one, clone a git repository, or use an existing directory.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["create", "clone", "existing"]},
                    "name": {"type": "string", "description": "Directory name for create and clone"},
                    "repo_url": {"type": "string", "description": "Repository URL, required for clone"},
                    "directory_path": {"type": "string", "description": "Existing path, required for existing"}
                },
                "required": ["mode"]
            }),
        },
        ToolDefinition {
            name: "complete_project_setup",
            description: "Mark project setup as completed. Call this when all setup questions are answered or the user wants to skip the rest.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// Tool names as the session sees them (`mcp__<server>__<tool>`)
#[must_use]
pub fn qualified_tool_names() -> Vec<String> {
    settings_tool_definitions()
        .iter()
        .map(|tool| format!("mcp__{SETTINGS_SERVER_NAME}__{}", tool.name))
        .collect()
}

/// How to launch the settings tool server for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsToolLauncher {
    program: String,
    args: Vec<String>,
}

impl SettingsToolLauncher {
    /// `program args... --project <id>` serves the tools over stdio
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Server entry for a session working on `project_id`
    #[must_use]
    pub fn server_for(&self, project_id: &str) -> McpServer {
        let mut args = self.args.clone();
        args.push("--project".to_string());
        args.push(project_id.to_string());
        McpServer::new(SETTINGS_SERVER_NAME, &self.program, args)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GetArgs {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    category: String,
    data: Value,
    #[serde(default)]
    merge_mode: UpdateMode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoArgs {
    title: Option<String>,
    description: Option<String>,
    purpose: Option<String>,
    primary_language: Option<String>,
    architecture_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryArgs {
    mode: String,
    name: Option<String>,
    repo_url: Option<String>,
    directory_path: Option<String>,
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| Error::InvalidData(format!("bad tool arguments: {e}")))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Settings tools bound to one project
#[derive(Clone)]
pub struct SettingsTools {
    service: SettingsService,
    project_id: String,
}

impl SettingsTools {
    /// Bind the tools to a project
    pub fn new(service: SettingsService, project_id: impl Into<String>) -> Self {
        Self {
            service,
            project_id: project_id.into(),
        }
    }

    /// Run a tool call. Failures are reported to the agent, not raised.
    #[tracing::instrument(skip(self, arguments), fields(project_id = %self.project_id))]
    pub async fn call(&self, name: &str, arguments: Value) -> ToolReply {
        debug!("Settings tool called");
        match self.dispatch(name, arguments).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Settings tool failed");
                ToolReply::error(format!("Error running {name}: {e}"))
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolReply> {
        let project_id = self.project_id.as_str();
        match name {
            "get_project_settings" => {
                let args: GetArgs = parse(arguments)?;
                let value = self
                    .service
                    .get_project_settings(project_id, args.category.as_deref())
                    .await?;
                Ok(ToolReply::ok(pretty(&value)))
            }
            "update_project_settings" => {
                let args: UpdateArgs = parse(arguments)?;
                let mode = args.merge_mode;
                match self
                    .service
                    .update_project_settings(project_id, &args.category, args.data, mode)
                    .await?
                {
                    SettingsUpdate::Applied { category, value } => Ok(ToolReply::ok(format!(
                        "Updated {category} ({}). New value: {}",
                        mode.as_str(),
                        pretty(&value)
                    ))),
                    SettingsUpdate::Redirected { notice, .. } => Ok(ToolReply::ok(notice)),
                }
            }
            "set_project_info" => {
                let args: InfoArgs = parse(arguments)?;
                let changed = self
                    .service
                    .set_project_info(
                        project_id,
                        ProjectInfoUpdate {
                            title: args.title,
                            description: args.description,
                            purpose: args.purpose,
                            primary_language: args.primary_language,
                            architecture_pattern: args.architecture_pattern,
                        },
                    )
                    .await?;
                if changed.is_empty() {
                    Ok(ToolReply::ok("No fields provided to update."))
                } else {
                    Ok(ToolReply::ok(format!("Updated project info: {}", changed.join(", "))))
                }
            }
            "setup_project_directory" => {
                let args: DirectoryArgs = parse(arguments)?;
                let setup = match args.mode.as_str() {
                    "create" => DirectorySetup::Create {
                        name: args.name.unwrap_or_else(|| "project".to_string()),
                    },
                    "clone" => match args.repo_url {
                        Some(repo_url) => DirectorySetup::Clone {
                            repo_url,
                            name: args.name,
                        },
                        None => return Ok(ToolReply::error("Error: repo_url is required for clone mode.")),
                    },
                    "existing" => match args.directory_path {
                        Some(path) => DirectorySetup::Existing { path },
                        None => {
                            return Ok(ToolReply::error(
                                "Error: directory_path is required for existing mode.",
                            ))
                        }
                    },
                    other => return Ok(ToolReply::error(format!("Unknown directory mode: {other}"))),
                };
                let path = self.service.setup_project_directory(project_id, setup).await?;
                Ok(ToolReply::ok(format!("Project directory set to: {}", path.display())))
            }
            "complete_project_setup" => {
                self.service.complete_project_setup(project_id).await?;
                Ok(ToolReply::ok("Project setup completed."))
            }
            other => Ok(ToolReply::error(format!("Unknown tool: {other}"))),
        }
    }
}
