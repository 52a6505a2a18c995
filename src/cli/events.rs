//! Live event output
//!
//! A subscriber task prints one status line per event to stderr while a
//! command runs. Final answers are printed by the command itself.

use conclave_core::model::AgentKind;
use conclave_core::{EventBus, OrchestratorEvent};
use conclave_llm::util::truncate_with_ellipsis;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

const TASK_PREVIEW_CHARS: usize = 80;

/// One status line for an event, or `None` for events not worth a line
pub fn describe(event: &OrchestratorEvent) -> Option<String> {
    let line = match event {
        OrchestratorEvent::AgentStarted {
            agent_kind, task, ..
        } if *agent_kind != AgentKind::Orchestrator => format!(
            "▶ {agent_kind}: {}",
            truncate_with_ellipsis(task, TASK_PREVIEW_CHARS, "...")
        ),
        OrchestratorEvent::AgentStopped {
            agent_id, status, ..
        } => format!("■ {} {status}", short_id(agent_id)),
        OrchestratorEvent::AgentTool { tool_name, .. } => format!("  ⚙ {tool_name}"),
        OrchestratorEvent::AgentToolResult {
            tool_name,
            status,
            duration_ms,
            ..
        } => format!("  ✓ {tool_name} {status} ({duration_ms}ms)"),
        OrchestratorEvent::ChatError { message, .. } => format!("✗ {message}"),
        OrchestratorEvent::PlanUpdated { status, .. } => format!("plan {status}"),
        OrchestratorEvent::PlanStepUpdated {
            step_id, status, ..
        } => format!("  step {step_id}: {status}"),
        OrchestratorEvent::WorkflowCheckpoint { step_id, .. } => format!("  checkpoint {step_id}"),
        OrchestratorEvent::WorkflowQualityGate { result, .. } => format!(
            "  gate {}: {} ({})",
            result.step_id,
            if result.passed { "passed" } else { "failed" },
            result.output
        ),
        OrchestratorEvent::WorkflowRollbackCompleted { success, .. } => {
            format!("rollback {}", if *success { "completed" } else { "failed" })
        }
        OrchestratorEvent::ProjectSettingsUpdated {
            category: Some(category),
            ..
        } => format!("settings {category} updated"),
        OrchestratorEvent::ProjectSetupCompleted { .. } => "setup completed".to_string(),
        OrchestratorEvent::MemoryUpdated { entry, action } => {
            format!("memory {} {}", short_id(&entry.id), action.as_str())
        }
        _ => return None,
    };
    Some(line)
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Print events until the bus closes or the handle is aborted
pub fn spawn_printer(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
