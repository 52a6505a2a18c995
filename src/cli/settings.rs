//! Settings CLI commands
//!
//! - `conclave settings get`: print one category or all settings
//! - `conclave settings update`: merge, replace or remove category data

use super::SettingsCommands;
use crate::app::App;
use anyhow::{Context, Result};
use conclave_core::settings::UpdateMode;
use conclave_core::SettingsUpdate;
use serde_json::Value;

/// Run a settings subcommand.
pub async fn run(cmd: SettingsCommands, app: &App) -> Result<()> {
    match cmd {
        SettingsCommands::Get { project, category } => {
            let value = app
                .settings
                .get_project_settings(&project, category.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        SettingsCommands::Update {
            project,
            category,
            data,
            mode,
        } => {
            let data: Value = serde_json::from_str(&data).context("Settings data must be JSON")?;
            let mode: UpdateMode = mode.parse()?;
            match app
                .settings
                .update_project_settings(&project, &category, data, mode)
                .await?
            {
                SettingsUpdate::Applied { category, value } => {
                    println!("{category}:");
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                SettingsUpdate::Redirected { notice, .. } => println!("{notice}"),
            }
            Ok(())
        }
    }
}
