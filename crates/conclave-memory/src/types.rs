//! Core data types for the knowledge memory.
//!
//! A [`KnowledgeEntry`] is a durable, freeform piece of knowledge about a
//! project or a whole workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Closed set of memory categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    /// Structure, components, design patterns
    Architecture,
    /// Coding standards and naming rules
    Convention,
    /// Decisions taken and their rationale
    Decision,
    /// Domain facts
    Fact,
    /// Known problems
    Issue,
}

impl MemoryCategory {
    /// All categories in canonical order
    pub const ALL: [MemoryCategory; 5] = [
        Self::Architecture,
        Self::Convention,
        Self::Decision,
        Self::Fact,
        Self::Issue,
    ];

    /// Lowercase name as stored
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Architecture => "architecture",
            Self::Convention => "convention",
            Self::Decision => "decision",
            Self::Fact => "fact",
            Self::Issue => "issue",
        }
    }

    /// Capitalized label used in rendered context
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Architecture => "Architecture",
            Self::Convention => "Convention",
            Self::Decision => "Decision",
            Self::Fact => "Fact",
            Self::Issue => "Issue",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "architecture" => Ok(Self::Architecture),
            "convention" => Ok(Self::Convention),
            "decision" => Ok(Self::Decision),
            "fact" => Ok(Self::Fact),
            "issue" => Ok(Self::Issue),
            other => Err(Error::InvalidData(format!("unknown memory category: {other}"))),
        }
    }
}

/// Visibility of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Visible to every project in the workspace
    #[default]
    Workspace,
    /// Visible only to the source project
    Project,
}

impl MemoryScope {
    /// Lowercase name as stored
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace" => Ok(Self::Workspace),
            "project" => Ok(Self::Project),
            other => Err(Error::InvalidData(format!("unknown memory scope: {other}"))),
        }
    }
}

/// A stored knowledge entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Unique entry ID (UUID)
    pub id: String,
    /// Owning workspace
    pub workspace_id: String,
    /// Category
    pub category: MemoryCategory,
    /// Visibility
    pub scope: MemoryScope,
    /// Short label
    pub key: String,
    /// Free text
    pub content: String,
    /// Project that produced the entry, if any
    pub source_project_id: Option<String>,
    /// 0.0 - 1.0
    pub confidence: f64,
    /// Retrieval counter, only ever increases
    pub use_count: u32,
    /// Settings location this entry was promoted to; set at most once
    pub promoted_to: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last edit time
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Whether this entry has been promoted into settings
    #[must_use]
    pub fn is_promoted(&self) -> bool {
        self.promoted_to.is_some()
    }
}

/// Input for creating an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeEntry {
    /// Owning workspace
    pub workspace_id: String,
    /// Category
    pub category: MemoryCategory,
    /// Short label
    pub key: String,
    /// Free text
    pub content: String,
    /// Visibility (defaults to workspace)
    #[serde(default)]
    pub scope: MemoryScope,
    /// Source project
    #[serde(default)]
    pub source_project_id: Option<String>,
    /// Confidence (defaults to 1.0)
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl NewKnowledgeEntry {
    /// Workspace-scoped entry with default confidence
    pub fn new(
        workspace_id: impl Into<String>,
        category: MemoryCategory,
        key: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            category,
            key: key.into(),
            content: content.into(),
            scope: MemoryScope::Workspace,
            source_project_id: None,
            confidence: None,
        }
    }

    /// Restrict visibility to one project
    #[must_use]
    pub fn for_project(mut self, project_id: impl Into<String>) -> Self {
        self.scope = MemoryScope::Project;
        self.source_project_id = Some(project_id.into());
        self
    }

    /// Record the source project without narrowing visibility
    #[must_use]
    pub fn with_source_project(mut self, project_id: impl Into<String>) -> Self {
        self.source_project_id = Some(project_id.into());
        self
    }

    /// Set confidence
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Partial update of an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeEntryUpdate {
    /// New category
    pub category: Option<MemoryCategory>,
    /// New key
    pub key: Option<String>,
    /// New content
    pub content: Option<String>,
    /// New confidence
    pub confidence: Option<f64>,
}

impl KnowledgeEntryUpdate {
    /// True when nothing would change
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.key.is_none()
            && self.content.is_none()
            && self.confidence.is_none()
    }
}

/// One search hit. Lower rank is better; fallback hits carry rank 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matched entry
    pub entry: KnowledgeEntry,
    /// Relevance rank
    pub rank: f64,
}
