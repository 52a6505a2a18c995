//! Conclave LLM - completion and agent session transports
//!
//! This crate provides the two model-facing seams used by the orchestration core:
//! - [`CompletionService`]: a single non-agentic completion (routing, synthesis, extraction)
//! - [`SessionRunner`]: a streaming, tool-using agent session
//!
//! Concrete implementations are [`AnthropicClient`] (HTTP Messages API) and
//! [`ClaudeCliRunner`] (drives the `claude` CLI in stream-json mode).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod claude_cli;
pub mod completion;
pub mod error;
pub mod models;
pub mod session;
pub mod util;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use claude_cli::{ClaudeCliConfig, ClaudeCliRunner};
pub use completion::{CompletionRequest, CompletionResponse, CompletionService, TokenUsage};
pub use error::{Error, Result};
pub use models::{resolve_model_id, ModelAlias, DEFAULT_MODEL_ALIAS};
pub use session::{
    mcp_config_json, McpServer, SessionEvent, SessionRequest, SessionRunner, SessionStream,
    TurnSummary,
};
