use crate::model::Project;
use serde_json::Value;

const TOP_CODING_STANDARDS: usize = 5;

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn non_empty_array<'a>(project: &'a Project, key: &str) -> Option<&'a Vec<Value>> {
    project
        .setting(key)
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
}

/// Render the project fields and key settings as a prompt block.
///
/// Returns `None` when the project has nothing worth showing.
#[must_use]
pub fn build_project_context(project: &Project) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if !project.title.is_empty() {
        parts.push(format!("Name: {}", project.title));
    }
    if let Some(purpose) = &project.purpose {
        parts.push(format!("Purpose: {purpose}"));
    }
    if let Some(language) = &project.primary_language {
        parts.push(format!("Primary language: {language}"));
    }
    if let Some(pattern) = &project.architecture_pattern {
        parts.push(format!("Architecture: {pattern}"));
    }

    if let Some(ai) = project.setting("ai") {
        if let Some(instructions) = ai.get("customInstructions").and_then(Value::as_str) {
            if !instructions.is_empty() {
                parts.push(format!("\nAI Instructions: {instructions}"));
            }
        }
        let avoid: Vec<&str> = ai
            .get("avoidPaths")
            .and_then(Value::as_array)
            .map(|paths| paths.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !avoid.is_empty() {
            parts.push(format!("Avoid paths: {}", avoid.join(", ")));
        }
    }

    if let Some(standards) = non_empty_array(project, "codingStandards") {
        let lines: Vec<String> = standards
            .iter()
            .take(TOP_CODING_STANDARDS)
            .map(|s| format!("- {}: {}", str_field(s, "rule"), str_field(s, "description")))
            .collect();
        parts.push(format!("\nConventions:\n{}", lines.join("\n")));
    }

    if let Some(services) = non_empty_array(project, "services") {
        let names: Vec<&str> = services.iter().map(|s| str_field(s, "name")).collect();
        parts.push(format!("Services: {}", names.join(", ")));
    }

    if let Some(stack) = non_empty_array(project, "techStack") {
        let primary: Vec<String> = stack
            .iter()
            .filter(|t| t.get("isPrimary").and_then(Value::as_bool).unwrap_or(false))
            .map(|t| match t.get("version").and_then(Value::as_str) {
                Some(version) if !version.is_empty() => {
                    format!("{} {version}", str_field(t, "name"))
                }
                _ => str_field(t, "name").to_string(),
            })
            .collect();
        if !primary.is_empty() {
            parts.push(format!("Tech stack: {}", primary.join(", ")));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
