use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{ToolInvocation, ToolStatus};
use crate::store::DataStore;
use chrono::Utc;
use conclave_llm::util::truncate_safe;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Stored tool output cap in bytes
pub const MAX_TOOL_OUTPUT_BYTES: usize = 10240;
const TRUNCATED_SUFFIX: &str = "...(truncated)";
const ABANDONED_OUTPUT: &str = "No result: the run ended first";

#[derive(Debug)]
struct PendingToolCall {
    id: String,
    agent_id: String,
    tool_name: String,
    started: Instant,
}

/// Persists and broadcasts tool calls, correlating start and result by the
/// session's tool-use id.
#[derive(Clone)]
pub struct ToolTracker {
    store: Arc<dyn DataStore>,
    events: EventBus,
    pending: Arc<DashMap<String, PendingToolCall>>,
}

fn render_output(output: &Value) -> String {
    let text = match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.len() > MAX_TOOL_OUTPUT_BYTES {
        format!("{}{TRUNCATED_SUFFIX}", truncate_safe(&text, MAX_TOOL_OUTPUT_BYTES))
    } else {
        text
    }
}

impl ToolTracker {
    /// Create a tracker
    pub fn new(store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Number of calls awaiting a result
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Record a tool call start. Returns the invocation id.
    pub async fn start(&self, agent_id: &str, tool_use_id: &str, tool_name: &str, input: &Value) -> String {
        let invocation = ToolInvocation {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: agent_id.to_string(),
            tool_name: tool_name.to_string(),
            input: input.to_string(),
            output: None,
            status: ToolStatus::Running,
            started_at: Utc::now(),
            duration_ms: None,
        };
        debug!(tool = %tool_name, agent_id = %agent_id, "Tool use started");

        self.pending.insert(
            tool_use_id.to_string(),
            PendingToolCall {
                id: invocation.id.clone(),
                agent_id: agent_id.to_string(),
                tool_name: tool_name.to_string(),
                started: Instant::now(),
            },
        );

        if let Err(e) = self.store.create_tool_invocation(&invocation).await {
            error!(error = %e, tool_call_id = %invocation.id, "Failed to persist tool call");
        }

        self.events.publish(OrchestratorEvent::AgentTool {
            id: invocation.id.clone(),
            agent_id: agent_id.to_string(),
            tool_name: tool_name.to_string(),
            input: input.clone(),
            status: ToolStatus::Running,
            timestamp: invocation.started_at,
        });
        invocation.id
    }

    /// Fail every call of `agent_id` still awaiting a result. Used when a
    /// run ends before its tools report back.
    pub async fn abandon_run(&self, agent_id: &str) -> usize {
        let orphaned: Vec<String> = self
            .pending
            .iter()
            .filter(|call| call.agent_id == agent_id)
            .map(|call| call.key().clone())
            .collect();

        let mut abandoned = 0;
        for tool_use_id in orphaned {
            let Some((_, pending)) = self.pending.remove(&tool_use_id) else {
                continue;
            };
            let duration_ms = u64::try_from(pending.started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if let Err(e) = self
                .store
                .complete_tool_invocation(&pending.id, ABANDONED_OUTPUT, ToolStatus::Failed, duration_ms)
                .await
            {
                error!(error = %e, tool_call_id = %pending.id, "Failed to update tool call");
            }
            abandoned += 1;
        }
        if abandoned > 0 {
            debug!(agent_id = %agent_id, abandoned, "Dropped tool calls without results");
        }
        abandoned
    }

    /// Record a tool result. Unknown ids are ignored.
    pub async fn complete(&self, tool_use_id: &str, output: &Value, is_error: bool) {
        let Some((_, pending)) = self.pending.remove(tool_use_id) else {
            debug!(tool_use_id = %tool_use_id, "Tool result without a pending call");
            return;
        };

        let duration_ms = u64::try_from(pending.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = if is_error {
            ToolStatus::Failed
        } else {
            ToolStatus::Completed
        };
        let rendered = render_output(output);

        if let Err(e) = self
            .store
            .complete_tool_invocation(&pending.id, &rendered, status, duration_ms)
            .await
        {
            error!(error = %e, tool_call_id = %pending.id, "Failed to update tool call");
        }

        self.events.publish(OrchestratorEvent::AgentToolResult {
            tool_call_id: pending.id,
            agent_id: pending.agent_id,
            tool_name: pending.tool_name,
            output: rendered,
            status,
            duration_ms,
        });
    }
}
