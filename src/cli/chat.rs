//! `conclave chat`: one orchestrator turn
//!
//! Ctrl-C interrupts the turn; whatever the agents produced so far is kept.

use super::events::spawn_printer;
use crate::app::App;
use anyhow::Result;
use conclave_core::model::RunStatus;
use conclave_core::{format_error_for_cli, MessageOptions};
use std::sync::Arc;
use tracing::info;

/// Send `message` to `project_id` and print the answer.
pub async fn run(app: &App, project_id: &str, message: &str, model: Option<String>) -> Result<()> {
    let orchestrator = Arc::new(app.orchestrator()?);
    let printer = spawn_printer(&app.events);

    let interrupter = {
        let orchestrator = orchestrator.clone();
        let project_id = project_id.to_string();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt requested");
                orchestrator.interrupt(&project_id);
            }
        })
    };

    let mut options = MessageOptions::new();
    if let Some(model) = model {
        options = options.with_model(model);
    }
    let result = orchestrator.handle_message(project_id, message, options).await;
    interrupter.abort();
    printer.abort();

    match result {
        Ok(outcome) => {
            if !outcome.response.is_empty() {
                println!("{}", outcome.response);
            }
            if outcome.status == RunStatus::Interrupted {
                eprintln!("(interrupted)");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error_for_cli(&e));
            Err(e.into())
        }
    }
}
