//! Output heuristics per agent kind

use crate::model::AgentKind;
use regex::Regex;
use std::sync::LazyLock;

static CHANGE_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(created|modified|updated|wrote|edited|added|changed)\b")
        .expect("CHANGE_VERB is a compile-time constant")
});

static SOURCE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(ts|js|tsx|jsx|py|go|rs|java|css|html|json|yaml|yml|toml)\b")
        .expect("SOURCE_EXTENSION is a compile-time constant")
});

static TEST_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(pass|fail|error|test|spec|suite|assert)\b")
        .expect("TEST_VOCABULARY is a compile-time constant")
});

static TEST_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s*(pass|fail|test)").expect("TEST_COUNT is a compile-time constant")
});

/// Validation verdict for one step output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// No issues found
    pub valid: bool,
    /// Human-readable problems
    pub issues: Vec<String>,
}

impl ValidationResult {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Issues joined for a gate result, or "All checks passed"
    #[must_use]
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            "All checks passed".to_string()
        } else {
            self.issues.join("; ")
        }
    }
}

/// Check an agent's output against what its kind is expected to produce.
///
/// Read-only agents only need to say something.
#[must_use]
pub fn validate_step_output(agent_kind: AgentKind, output: &str) -> ValidationResult {
    if output.trim().is_empty() {
        return ValidationResult::from_issues(vec!["Step produced no output".to_string()]);
    }

    let mut issues = Vec::new();
    match agent_kind {
        AgentKind::Implementer => {
            if !CHANGE_VERB.is_match(output) && !SOURCE_EXTENSION.is_match(output) {
                issues.push("Implementer output does not reference any file changes".to_string());
            }
        }
        AgentKind::TestRunner => {
            if !TEST_VOCABULARY.is_match(output) && !TEST_COUNT.is_match(output) {
                issues.push("Test runner output does not contain test results".to_string());
            }
        }
        _ => {}
    }
    ValidationResult::from_issues(issues)
}
