//! Project settings: merge policies, the post-setup redirect gate,
//! directory setup and the agent tool surface.

pub mod directory;
pub mod merge;
mod service;
mod tools;

pub use directory::{prepare_directory, resolve_directory, sanitize_dir_name, DirectorySetup};
pub use merge::{apply_update, identifier_of, MergeKind, UpdateMode, IDENTIFIER_FIELDS};
pub use service::{ProjectInfoUpdate, SettingsService, SettingsUpdate};
pub use tools::{
    qualified_tool_names, settings_tool_definitions, SettingsToolLauncher, SettingsTools,
    ToolDefinition, ToolReply, SETTINGS_SERVER_NAME,
};

#[cfg(test)]
mod tests;
