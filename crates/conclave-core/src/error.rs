//! Error types for conclave-core
//!
//! This module provides error types and user-friendly error formatting.

use crate::knowledge::PromotionError;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Completion or session transport error
    #[error("llm error: {0}")]
    Llm(#[from] conclave_llm::Error),

    /// Memory store error
    #[error("memory error: {0}")]
    Memory(#[from] conclave_memory::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored or supplied data is malformed
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Settings update rejected
    #[error("settings error: {0}")]
    Settings(String),

    /// Memory promotion could not be applied
    #[error("promotion error: {0}")]
    Promotion(#[from] PromotionError),

    /// Workflow could not be created or executed
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Version control command failed
    #[error("vcs error: {0}")]
    Vcs(String),

    /// Project token budget exhausted
    #[error("budget exceeded: used {used} of {budget} tokens")]
    BudgetExceeded {
        /// Tokens used so far
        used: u64,
        /// Configured budget
        budget: u64,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Llm(conclave_llm::Error::NotConfigured(provider)) => {
                format!("🔑 {} is not configured.", provider)
            }
            Error::Llm(conclave_llm::Error::RateLimit) => {
                "⏳ Rate limit exceeded. Please try again later.".to_string()
            }
            Error::Llm(e) => format!("🤖 Model error: {}", e),
            Error::Memory(e) => format!("🧠 Memory error: {}", e),
            Error::Database(_) => "💾 Database error.".to_string(),
            Error::Serialization(e) => format!("📄 Could not read stored data: {}", e),
            Error::Io(e) => format!("📁 File system error: {}", e),
            Error::NotFound(what) => format!("🔍 Not found: {}", what),
            Error::InvalidData(msg) => format!("⚠️ Invalid data: {}", msg),
            Error::Settings(msg) => format!("⚙️ Settings update failed: {}", msg),
            Error::Promotion(e) => format!("📌 Promotion failed: {}", e),
            Error::Workflow(msg) => format!("🔀 Workflow failed: {}", msg),
            Error::Vcs(msg) => format!("🌿 Git command failed: {}", msg),
            Error::BudgetExceeded { used, budget } => {
                format!("💸 Token budget exhausted ({} of {} tokens).", used, budget)
            }
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::Internal(msg) => format!("❌ Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Llm(conclave_llm::Error::NotConfigured(_)) => Some(
                "💡 Set the ANTHROPIC_API_KEY environment variable or add it to .env.".to_string(),
            ),
            Error::Llm(conclave_llm::Error::RateLimit) => {
                Some("💡 Try a smaller model alias or wait before retrying.".to_string())
            }
            Error::Llm(conclave_llm::Error::Session(_)) => Some(
                "💡 Check that the claude CLI is installed and on your PATH.".to_string(),
            ),
            Error::Database(_) => {
                Some("💡 Check the [data] path in config/default.toml.".to_string())
            }
            Error::Promotion(PromotionError::AlreadyPromoted { .. }) => {
                Some("💡 The entry is already part of the project settings.".to_string())
            }
            Error::Vcs(_) => {
                Some("💡 Make sure the project directory is a git repository.".to_string())
            }
            Error::BudgetExceeded { .. } => Some(
                "💡 Raise orchestrator.token_budget or set it to 0 to disable the limit."
                    .to_string(),
            ),
            Error::Configuration(_) => {
                Some("💡 Check config/default.toml and CONCLAVE__* variables.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = String::new();

    output.push_str(&error.user_message());
    output.push_str("\n\n");

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}

/// Format an error for display in a chat message
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}
