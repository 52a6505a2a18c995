//! Completion request and response types
//!
//! A completion is a single, non-agentic model call: one system prompt, one
//! user turn, one text answer. Routing and synthesis are built on it.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Sum of input and output tokens
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Full model id (empty selects the provider default)
    pub model: String,
    /// System prompt
    pub system: String,
    /// Single user message
    pub user_content: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a new completion request
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 1024,
            ..Default::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Set the user message
    #[must_use]
    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.user_content = content.into();
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Concatenated text blocks
    pub content: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Model that answered
    pub model: String,
}

/// Non-agentic completion transport.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
