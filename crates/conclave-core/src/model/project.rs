use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A project and its settled settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project ID
    pub id: String,
    /// Workspace the project belongs to
    pub workspace_id: String,
    /// Display name
    pub title: String,
    /// Short description
    pub description: Option<String>,
    /// What the project is for
    pub purpose: Option<String>,
    /// Main language
    pub primary_language: Option<String>,
    /// Architecture pattern
    pub architecture_pattern: Option<String>,
    /// Working directory for agents
    pub directory_path: Option<String>,
    /// Settings keyed by category
    pub metadata: Map<String, Value>,
    /// One-way setup flag
    pub setup_completed: bool,
    /// Resumable setup session
    pub sdk_session_id: Option<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Last settings change
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a project with empty settings
    pub fn new(workspace_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            title: title.into(),
            description: None,
            purpose: None,
            primary_language: None,
            architecture_pattern: None,
            directory_path: None,
            metadata: Map::new(),
            setup_completed: false,
            sdk_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the working directory
    #[must_use]
    pub fn with_directory(mut self, path: impl Into<String>) -> Self {
        self.directory_path = Some(path.into());
        self
    }

    /// Settings value for a category, if any
    #[must_use]
    pub fn setting(&self, category: &str) -> Option<&Value> {
        self.metadata.get(category)
    }
}

/// Author of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End user
    User,
    /// Final assistant response
    Assistant,
    /// System notice
    System,
}

text_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

/// A persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message ID
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Author
    pub role: MessageRole,
    /// Text
    pub content: String,
    /// Run that produced the message
    pub agent_id: Option<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a message stamped now
    pub fn new(project_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            role,
            content: content.into(),
            agent_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attribute the message to a run
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Running per-project usage totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectBudget {
    /// Project ID
    pub project_id: String,
    /// Tokens used across all turns
    pub tokens_used: u64,
    /// Cost across all turns
    pub cost_usd: f64,
}

/// One block of an assembled agent prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    /// Section name
    pub name: String,
    /// Whether the section made it into the prompt
    pub included: bool,
    /// Section body
    pub content: String,
}

impl ContextSection {
    /// Build a section; empty content counts as not included
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            included: !content.is_empty(),
            content,
        }
    }

    /// A section that was disabled for this agent
    pub fn excluded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included: false,
            content: String::new(),
        }
    }
}
