//! Task intent classification from raw query text.

use crate::types::MemoryCategory;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use MemoryCategory::{Architecture, Convention, Decision, Fact, Issue};

/// What kind of task a query describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskIntent {
    /// Fixing a defect
    BugFix,
    /// Adding functionality
    Feature,
    /// Restructuring existing code
    Refactor,
    /// Understanding or reviewing code
    Analysis,
    /// Anything else
    #[default]
    General,
}

static BUG_FIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(bug|fix|broken|error|crash|fail|issue|wrong|incorrect|regression|patch|hotfix|debug|exception|stack\s?trace)\b",
    )
    .expect("intent pattern is a compile-time constant")
});

static REFACTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(refactor|restructure|reorganize|clean\s?up|simplify|extract|rename|move|split|merge|consolidate|decouple|modularize|optimize|performance)\b",
    )
    .expect("intent pattern is a compile-time constant")
});

static ANALYSIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(analy[sz]e|explain|understand|investigate|explore|review|audit|inspect|assess|evaluate|document|describe|how\s+does|what\s+is|architecture|structure)\b",
    )
    .expect("intent pattern is a compile-time constant")
});

static FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(feature|add|new|implement|create|introduce|support|enable|extend|integrate|endpoint|ui|ux|page|component)\b",
    )
    .expect("intent pattern is a compile-time constant")
});

impl TaskIntent {
    /// Categories from most to least relevant for this intent.
    #[must_use]
    pub fn priority(self) -> &'static [MemoryCategory; 5] {
        match self {
            Self::BugFix => &[Issue, Fact, Architecture, Convention, Decision],
            Self::Feature | Self::Refactor => &[Architecture, Convention, Decision, Fact, Issue],
            Self::Analysis => &[Architecture, Fact, Decision, Convention, Issue],
            Self::General => &[Fact, Architecture, Convention, Decision, Issue],
        }
    }

    /// Kebab-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BugFix => "bug-fix",
            Self::Feature => "feature",
            Self::Refactor => "refactor",
            Self::Analysis => "analysis",
            Self::General => "general",
        }
    }
}

/// Classify a query. Specific intents are tried before `General`.
#[must_use]
pub fn detect_task_intent(query: &str) -> TaskIntent {
    let ordered: [(&LazyLock<Regex>, TaskIntent); 4] = [
        (&BUG_FIX, TaskIntent::BugFix),
        (&REFACTOR, TaskIntent::Refactor),
        (&ANALYSIS, TaskIntent::Analysis),
        (&FEATURE, TaskIntent::Feature),
    ];
    ordered
        .into_iter()
        .find(|(re, _)| re.is_match(query))
        .map_or(TaskIntent::General, |(_, intent)| intent)
}
