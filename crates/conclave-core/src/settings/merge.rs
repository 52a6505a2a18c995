//! Category-aware merge policies for project settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields tried, in order, to identify an item inside an array category
pub const IDENTIFIER_FIELDS: &[&str] = &[
    "name", "key", "rule", "tool", "framework", "title", "id", "path",
];

const ARRAY_CATEGORIES: &[&str] = &[
    "goals",
    "techStack",
    "designPatterns",
    "apiEndpoints",
    "folderMappings",
    "entryPoints",
    "modules",
    "services",
    "databases",
    "messageQueues",
    "caches",
    "environments",
    "ciCd",
    "infraAsCode",
    "team",
    "codeOwnership",
    "testing",
    "linting",
    "build",
    "scripts",
    "roadmap",
    "namingConventions",
    "codingStandards",
    "errorHandling",
    "documentation",
    "adrs",
    "keyDependencies",
    "externalIntegrations",
    "performanceBudgets",
    "monitoring",
    "slas",
    "domainConcepts",
    "userPersonas",
    "businessRules",
    "runbooks",
    "migrations",
    "knownIssues",
    "techDebt",
];

const OBJECT_CATEGORIES: &[&str] = &[
    "git",
    "prProcess",
    "logging",
    "security",
    "ai",
    "release",
    "accessibility",
    "i18n",
    "featureFlags",
];

const TAG_CATEGORY: &str = "tags";

/// How a settings category stores its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Array of records matched by the first present identifier field
    Array(&'static [&'static str]),
    /// Object merged key by key
    Object,
    /// Scalar replaced wholesale
    Primitive,
    /// Array of strings treated as a set
    TagSet,
}

impl MergeKind {
    /// Resolve the merge kind of a category
    #[must_use]
    pub fn for_category(category: &str) -> Self {
        if category == TAG_CATEGORY {
            MergeKind::TagSet
        } else if ARRAY_CATEGORIES.contains(&category) {
            MergeKind::Array(IDENTIFIER_FIELDS)
        } else if OBJECT_CATEGORIES.contains(&category) {
            MergeKind::Object
        } else {
            MergeKind::Primitive
        }
    }

    /// Whether the category stores an array
    #[must_use]
    pub fn is_array(self) -> bool {
        matches!(self, MergeKind::Array(_) | MergeKind::TagSet)
    }
}

/// Settings update mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Category-aware merge
    #[default]
    Merge,
    /// Full overwrite
    Replace,
    /// Remove matching items or keys
    Remove,
}

impl UpdateMode {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl std::str::FromStr for UpdateMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "merge" => Ok(UpdateMode::Merge),
            "replace" => Ok(UpdateMode::Replace),
            "remove" => Ok(UpdateMode::Remove),
            other => Err(crate::Error::InvalidData(format!("unknown update mode: {other}"))),
        }
    }
}

/// First identifier value found on an item
#[must_use]
pub fn identifier_of<'a>(item: &'a Value, fields: &[&str]) -> Option<&'a str> {
    let obj = item.as_object()?;
    fields.iter().find_map(|f| obj.get(*f).and_then(Value::as_str))
}

/// Apply `incoming` to `current` under the given merge kind and mode
#[must_use]
pub fn apply_update(current: Option<&Value>, incoming: Value, kind: MergeKind, mode: UpdateMode) -> Value {
    match mode {
        UpdateMode::Merge => merge(current, incoming, kind),
        UpdateMode::Replace => {
            if kind.is_array() && !incoming.is_array() && !incoming.is_null() {
                Value::Array(vec![incoming])
            } else {
                incoming
            }
        }
        UpdateMode::Remove => remove(current, incoming, kind),
    }
}

fn as_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn current_items(current: Option<&Value>) -> Vec<Value> {
    current
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn merge(current: Option<&Value>, incoming: Value, kind: MergeKind) -> Value {
    match kind {
        MergeKind::TagSet => {
            let mut tags = current_items(current);
            let mut seen: HashSet<String> = tags
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            for item in as_items(incoming) {
                if let Some(tag) = item.as_str() {
                    if seen.insert(tag.to_string()) {
                        tags.push(item);
                    }
                }
            }
            Value::Array(tags)
        }
        MergeKind::Array(fields) => {
            let mut result = current_items(current);
            for item in as_items(incoming) {
                let existing = identifier_of(&item, fields).and_then(|id| {
                    result
                        .iter()
                        .position(|r| identifier_of(r, fields) == Some(id))
                });
                match (existing, item) {
                    (Some(idx), Value::Object(patch)) => {
                        if let Value::Object(target) = &mut result[idx] {
                            target.extend(patch);
                        } else {
                            result[idx] = Value::Object(patch);
                        }
                    }
                    (_, item) => result.push(item),
                }
            }
            Value::Array(result)
        }
        MergeKind::Object => match (current, incoming) {
            (Some(Value::Object(base)), Value::Object(patch)) => {
                let mut merged: Map<String, Value> = base.clone();
                merged.extend(patch);
                Value::Object(merged)
            }
            (_, incoming) => incoming,
        },
        MergeKind::Primitive => incoming,
    }
}

fn remove(current: Option<&Value>, to_remove: Value, kind: MergeKind) -> Value {
    match kind {
        MergeKind::TagSet => {
            let remove: HashSet<String> = as_items(to_remove)
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            Value::Array(
                current_items(current)
                    .into_iter()
                    .filter(|t| t.as_str().map_or(true, |s| !remove.contains(s)))
                    .collect(),
            )
        }
        MergeKind::Array(fields) => {
            let items = as_items(to_remove);
            let remove: HashSet<&str> = items
                .iter()
                .filter_map(|i| identifier_of(i, fields))
                .collect();
            Value::Array(
                current_items(current)
                    .into_iter()
                    .filter(|item| identifier_of(item, fields).map_or(true, |id| !remove.contains(id)))
                    .collect(),
            )
        }
        MergeKind::Object => match (current, to_remove) {
            (Some(Value::Object(base)), Value::Object(keys)) => {
                let mut result = base.clone();
                for key in keys.keys() {
                    result.remove(key);
                }
                Value::Object(result)
            }
            _ => Value::Null,
        },
        MergeKind::Primitive => Value::Null,
    }
}
