//! Rolling per-project session summary.

use conclave_llm::util::truncate_chars;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::debug;

const MAX_COMPLETED_STEPS: usize = 10;
const MAX_FILES_MODIFIED: usize = 20;
/// Cap on the rendered summary
pub const MAX_SUMMARY_LENGTH: usize = 2000;

static FILE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:created|modified|updated|wrote|edited)\s+[`"]?([^\s`"]+\.[a-zA-Z]+)[`"]?"#)
        .expect("FILE_MENTION is a compile-time constant")
});

/// Structured summary of a project's session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// First user request
    pub objective: Option<String>,
    /// Recent requests, oldest first
    pub completed_steps: Vec<String>,
    /// Files the assistant reported touching
    pub files_modified: Vec<String>,
    /// Open problems
    pub pending_issues: Vec<String>,
    /// Decisions taken
    pub key_decisions: Vec<String>,
}

fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        format!("{}...", truncate_chars(text, limit - 3))
    } else {
        text.to_string()
    }
}

impl ProjectSummary {
    /// Render as prompt text, capped at [`MAX_SUMMARY_LENGTH`]
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(objective) = &self.objective {
            parts.push(format!("Objective: {objective}"));
        }
        if !self.completed_steps.is_empty() {
            parts.push(format!("Completed: {}", self.completed_steps.join("; ")));
        }
        if !self.files_modified.is_empty() {
            parts.push(format!("Files modified: {}", self.files_modified.join(", ")));
        }
        if !self.pending_issues.is_empty() {
            parts.push(format!("Pending: {}", self.pending_issues.join("; ")));
        }
        if !self.key_decisions.is_empty() {
            parts.push(format!("Decisions: {}", self.key_decisions.join("; ")));
        }
        clip(&parts.join("\n"), MAX_SUMMARY_LENGTH)
    }
}

/// Shared store of session summaries keyed by project
#[derive(Debug, Clone, Default)]
pub struct SummaryCache {
    summaries: Arc<DashMap<String, ProjectSummary>>,
}

impl SummaryCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered summary for a project
    #[must_use]
    pub fn summary(&self, project_id: &str) -> Option<String> {
        self.summaries.get(project_id).map(|s| s.render())
    }

    /// Structured summary for a project
    #[must_use]
    pub fn structured(&self, project_id: &str) -> Option<ProjectSummary> {
        self.summaries.get(project_id).map(|s| s.value().clone())
    }

    /// Fold a finished exchange into the summary
    pub fn update_from_response(&self, project_id: &str, user_message: &str, response: &str) {
        let mut entry = self.summaries.entry(project_id.to_string()).or_default();
        let summary = entry.value_mut();

        if summary.objective.is_none() {
            summary.objective = Some(clip(user_message, 200));
        }

        for caps in FILE_MENTION.captures_iter(response) {
            let file = &caps[1];
            if !summary.files_modified.iter().any(|f| f == file) {
                summary.files_modified.push(file.to_string());
            }
        }

        summary.completed_steps.push(clip(user_message, 100));
        if summary.completed_steps.len() > MAX_COMPLETED_STEPS {
            let excess = summary.completed_steps.len() - MAX_COMPLETED_STEPS;
            summary.completed_steps.drain(..excess);
        }
        if summary.files_modified.len() > MAX_FILES_MODIFIED {
            let excess = summary.files_modified.len() - MAX_FILES_MODIFIED;
            summary.files_modified.drain(..excess);
        }

        debug!(project_id = %project_id, "Summary cache updated");
    }

    /// Record an open problem
    pub fn note_issue(&self, project_id: &str, issue: impl Into<String>) {
        self.summaries
            .entry(project_id.to_string())
            .or_default()
            .pending_issues
            .push(issue.into());
    }

    /// Record a decision
    pub fn note_decision(&self, project_id: &str, decision: impl Into<String>) {
        self.summaries
            .entry(project_id.to_string())
            .or_default()
            .key_decisions
            .push(decision.into());
    }

    /// Forget a project's summary
    pub fn clear(&self, project_id: &str) {
        self.summaries.remove(project_id);
    }
}
