//! Agentic session runner seam
//!
//! A session is one bounded, tool-using agent run. The runner turns it into a
//! stream of [`SessionEvent`]s; the orchestration core only relies on text
//! deltas, tool use/result pairs, a turn-complete summary and a session id.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stream of events produced by one session
pub type SessionStream = BoxStream<'static, Result<SessionEvent>>;

/// Options for a single session
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    /// User prompt (the task)
    pub prompt: String,
    /// Full system prompt
    pub system_prompt: String,
    /// Tools the agent may use
    pub allowed_tools: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Full model id
    pub model: String,
    /// Maximum agent turns
    pub max_turns: u32,
    /// Session id to resume
    pub resume: Option<String>,
    /// MCP servers started for this session
    pub mcp_servers: Vec<McpServer>,
}

/// An MCP server the session launches over stdio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    /// Server name; tools appear as `mcp__<name>__<tool>`
    pub name: String,
    /// Program to run
    pub command: String,
    /// Program arguments
    pub args: Vec<String>,
}

impl McpServer {
    /// Describe a stdio server
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
        }
    }
}

/// `{"mcpServers": {...}}` document for a set of servers
#[must_use]
pub fn mcp_config_json(servers: &[McpServer]) -> serde_json::Value {
    let entries: serde_json::Map<String, serde_json::Value> = servers
        .iter()
        .map(|server| {
            (
                server.name.clone(),
                serde_json::json!({
                    "type": "stdio",
                    "command": server.command,
                    "args": server.args,
                }),
            )
        })
        .collect();
    serde_json::json!({ "mcpServers": entries })
}

impl SessionRequest {
    /// Create a request for a prompt
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_turns: 30,
            ..Default::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set allowed tools
    #[must_use]
    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the model id
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max turn count
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Resume a previous session
    #[must_use]
    pub fn with_resume(mut self, session_id: Option<String>) -> Self {
        self.resume = session_id;
        self
    }

    /// Attach an MCP server
    #[must_use]
    pub fn with_mcp_server(mut self, server: McpServer) -> Self {
        self.mcp_servers.push(server);
        self
    }
}

/// Final summary of a session turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    /// Whether the turn finished with the success subtype
    pub success: bool,
    /// Final result text reported by the runner, if any
    pub result: Option<String>,
    /// Cumulative cost in USD
    pub cost_usd: f64,
    /// Cumulative input tokens
    pub input_tokens: u64,
    /// Cumulative output tokens
    pub output_tokens: u64,
}

/// Event produced by a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Session id became known (usable for resumption)
    SessionStarted {
        /// Session identifier
        session_id: String,
    },
    /// Streaming text fragment
    TextDelta {
        /// Text chunk
        text: String,
    },
    /// A complete assistant text message
    AssistantText {
        /// Message text
        text: String,
    },
    /// The agent invoked a tool
    ToolUse {
        /// Correlation id shared with the matching result
        tool_use_id: String,
        /// Tool name
        tool_name: String,
        /// Tool input
        input: serde_json::Value,
    },
    /// A tool finished
    ToolResult {
        /// Correlation id of the originating tool use
        tool_use_id: String,
        /// Tool output
        output: serde_json::Value,
        /// Whether the tool reported an error
        is_error: bool,
    },
    /// The turn finished
    TurnComplete(TurnSummary),
}

/// Streaming agentic session transport.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Start a session. Dropping the returned stream ends the session.
    async fn start(&self, request: SessionRequest) -> Result<SessionStream>;
}
