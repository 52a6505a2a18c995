//! Bidirectional mapping between memory categories and settings categories.

use conclave_memory::MemoryCategory;
use serde_json::Value;

/// Settings categories that have a memory counterpart
pub const OVERLAPPING_SETTINGS_CATEGORIES: &[&str] = &[
    "codingStandards",
    "namingConventions",
    "errorHandling",
    "designPatterns",
    "architecturePattern",
    "adrs",
    "domainConcepts",
    "knownIssues",
];

/// Settings categories that hold the same kind of knowledge as a memory category
#[must_use]
pub fn settings_categories_for(category: MemoryCategory) -> &'static [&'static str] {
    match category {
        MemoryCategory::Convention => &["codingStandards", "namingConventions", "errorHandling"],
        MemoryCategory::Architecture => &["designPatterns", "architecturePattern"],
        MemoryCategory::Decision => &["adrs"],
        MemoryCategory::Fact => &["domainConcepts"],
        MemoryCategory::Issue => &["knownIssues"],
    }
}

/// Memory category for an overlapping settings category
#[must_use]
pub fn memory_category_for(settings_category: &str) -> Option<MemoryCategory> {
    MemoryCategory::ALL
        .into_iter()
        .find(|c| settings_categories_for(*c).contains(&settings_category))
}

/// Whether a settings category is subject to the post-setup redirect
#[must_use]
pub fn is_overlapping(settings_category: &str) -> bool {
    OVERLAPPING_SETTINGS_CATEGORIES.contains(&settings_category)
}

/// Whether a settings value carries any data
#[must_use]
pub fn has_data(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
