//! Unified knowledge built from settled settings and memory entries.

use super::mapping::{has_data, settings_categories_for};
use chrono::{DateTime, Utc};
use conclave_memory::{KnowledgeEntry, MemoryCategory};
use serde_json::{Map, Value};

/// Header for memory entries that postdate the last settings change
pub const RECENT_UPDATES_HEADING: &str = "\n### Recent Updates";

const RECENT_UPDATES_NOTE: &str =
    "*These memory entries are newer than the settled settings and may supersede them:*";

fn overlaps_settings(metadata: &Map<String, Value>, category: MemoryCategory) -> bool {
    settings_categories_for(category)
        .iter()
        .any(|key| has_data(metadata.get(*key)))
}

/// Merge settings context and memory entries into one prompt block.
///
/// Entries whose category has settled settings data are shown only when
/// they were updated after `project_updated_at`.
#[must_use]
pub fn build_unified_knowledge(
    settings_context: Option<&str>,
    entries: &[KnowledgeEntry],
    metadata: &Map<String, Value>,
    project_updated_at: DateTime<Utc>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(ctx) = settings_context.filter(|c| !c.is_empty()) {
        parts.push(ctx.to_string());
    }

    let (overlapping, standalone): (Vec<&KnowledgeEntry>, Vec<&KnowledgeEntry>) = entries
        .iter()
        .partition(|e| overlaps_settings(metadata, e.category));

    // Groups keep the order in which categories first appear
    let mut groups: Vec<(MemoryCategory, Vec<&KnowledgeEntry>)> = Vec::new();
    for entry in standalone {
        match groups.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, items)) => items.push(entry),
            None => groups.push((entry.category, vec![entry])),
        }
    }
    for (category, items) in groups {
        parts.push(format!("\n### {}", category.label()));
        for item in items {
            parts.push(format!("- **{}**: {}", item.key, item.content));
        }
    }

    let newer: Vec<&KnowledgeEntry> = overlapping
        .into_iter()
        .filter(|e| e.updated_at > project_updated_at)
        .collect();
    if !newer.is_empty() {
        parts.push(RECENT_UPDATES_HEADING.to_string());
        parts.push(RECENT_UPDATES_NOTE.to_string());
        for entry in newer {
            parts.push(format!(
                "- **[{}] {}**: {}",
                entry.category.label(),
                entry.key,
                entry.content
            ));
        }
    }

    parts.join("\n")
}
