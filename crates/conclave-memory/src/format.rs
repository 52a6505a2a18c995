//! Markdown rendering of entries for agent prompts.

use crate::types::{KnowledgeEntry, MemoryCategory};
use std::fmt::Write;

/// Render entries grouped under `## Category` headings in canonical order.
///
/// Returns an empty string when there is nothing to render.
#[must_use]
pub fn format_for_context(entries: &[KnowledgeEntry]) -> String {
    let refs: Vec<&KnowledgeEntry> = entries.iter().collect();
    format_grouped(&refs)
}

/// Same as [`format_for_context`] over borrowed entries.
#[must_use]
pub fn format_grouped(entries: &[&KnowledgeEntry]) -> String {
    let mut out = String::new();
    for category in MemoryCategory::ALL {
        let mut group = entries.iter().filter(|e| e.category == category).peekable();
        if group.peek().is_none() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "## {}", category.label());
        for entry in group {
            let _ = writeln!(out, "- **{}**: {}", entry.key, entry.content);
        }
    }
    out.trim_end().to_string()
}
