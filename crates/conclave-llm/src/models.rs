//! Model alias resolution
//!
//! Users and routing plans refer to models by short alias; transports need full ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alias used when none is given or the given one is unknown
pub const DEFAULT_MODEL_ALIAS: &str = "sonnet";

/// Short model alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelAlias {
    /// Balanced default
    Sonnet,
    /// Most capable
    Opus,
    /// Fastest
    Haiku,
}

impl ModelAlias {
    /// Full model id for this alias
    #[must_use]
    pub fn model_id(self) -> &'static str {
        match self {
            Self::Sonnet => "claude-sonnet-4-5-20250929",
            Self::Opus => "claude-opus-4-5-20250514",
            Self::Haiku => "claude-haiku-4-5-20251001",
        }
    }

    /// Alias name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sonnet => "sonnet",
            Self::Opus => "opus",
            Self::Haiku => "haiku",
        }
    }
}

impl fmt::Display for ModelAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelAlias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sonnet" => Ok(Self::Sonnet),
            "opus" => Ok(Self::Opus),
            "haiku" => Ok(Self::Haiku),
            other => Err(format!("unknown model alias: {other}")),
        }
    }
}

/// Resolve a short alias to a full model id, defaulting to sonnet.
#[must_use]
pub fn resolve_model_id(alias: Option<&str>) -> &'static str {
    alias
        .and_then(|a| a.parse::<ModelAlias>().ok())
        .unwrap_or(ModelAlias::Sonnet)
        .model_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_aliases() {
        assert_eq!(resolve_model_id(Some("opus")), ModelAlias::Opus.model_id());
        assert_eq!(resolve_model_id(Some("HAIKU")), ModelAlias::Haiku.model_id());
    }

    #[test]
    fn test_resolve_defaults_to_sonnet() {
        assert_eq!(resolve_model_id(None), ModelAlias::Sonnet.model_id());
        assert_eq!(resolve_model_id(Some("gpt-9")), ModelAlias::Sonnet.model_id());
    }
}
