//! Agent Execution Unit
//!
//! Runs one bounded sub-agent session and always returns a result record:
//! errors become `failed`, observed cancellation becomes `interrupted`.

use super::definitions::{agent_definition, ContextHintOverrides};
use super::tool_tracker::ToolTracker;
use crate::context::{ContextBuilder, ExecutionContextCache};
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{AgentKind, AgentRun, Project, RunStatus};
use crate::store::DataStore;
use conclave_llm::util::truncate_chars;
use conclave_llm::{resolve_model_id, SessionEvent, SessionRequest, SessionRunner, TurnSummary};
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Characters of the response kept as the run's result summary
pub const RESULT_SUMMARY_CHARS: usize = 500;
/// Default agent turn cap
pub const DEFAULT_MAX_TURNS: u32 = 30;

/// One sub-agent assignment
#[derive(Debug, Clone)]
pub struct AgentTask {
    /// Agent to run
    pub agent_kind: AgentKind,
    /// Task description
    pub task: String,
    /// Model alias; the runner default applies when absent
    pub model: Option<String>,
    /// Context hint overrides
    pub hint_overrides: Option<ContextHintOverrides>,
    /// Dispatching orchestrator run
    pub parent_run_id: Option<String>,
}

impl AgentTask {
    /// Create a task
    pub fn new(agent_kind: AgentKind, task: impl Into<String>) -> Self {
        Self {
            agent_kind,
            task: task.into(),
            model: None,
            hint_overrides: None,
            parent_run_id: None,
        }
    }

    /// Use a specific model alias
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Attach the dispatching run
    #[must_use]
    pub fn with_parent(mut self, parent_run_id: impl Into<String>) -> Self {
        self.parent_run_id = Some(parent_run_id.into());
        self
    }

    /// Override context hints
    #[must_use]
    pub fn with_hints(mut self, overrides: ContextHintOverrides) -> Self {
        self.hint_overrides = Some(overrides);
        self
    }
}

/// Outcome of a sub-agent run
#[derive(Debug, Clone)]
pub struct SubAgentResult {
    /// Run ID
    pub run_id: String,
    /// Agent kind
    pub agent_kind: AgentKind,
    /// Terminal status
    pub status: RunStatus,
    /// Response text, possibly partial
    pub response_text: String,
    /// Cost in USD
    pub cost_usd: f64,
    /// Input plus output tokens
    pub tokens: u64,
    /// Error message for failed runs
    pub error: Option<String>,
}

/// What a drained session produced
#[derive(Debug, Default)]
pub(crate) struct SessionOutcome {
    pub text: String,
    pub session_id: Option<String>,
    pub summary: Option<TurnSummary>,
    pub interrupted: bool,
}

impl SessionOutcome {
    pub(crate) fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else if self.summary.as_ref().is_some_and(|s| !s.success) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }
}

/// Executes sub-agent sessions and tracks their cancellation handles
#[derive(Clone)]
pub struct AgentRunner {
    sessions: Arc<dyn SessionRunner>,
    store: Arc<dyn DataStore>,
    context: ContextBuilder,
    tools: ToolTracker,
    events: EventBus,
    active: Arc<DashMap<String, CancellationToken>>,
    default_model: Option<String>,
    max_turns: u32,
}

impl AgentRunner {
    /// Create a runner
    pub fn new(
        sessions: Arc<dyn SessionRunner>,
        store: Arc<dyn DataStore>,
        context: ContextBuilder,
        events: EventBus,
    ) -> Self {
        let tools = ToolTracker::new(store.clone(), events.clone());
        Self {
            sessions,
            store,
            context,
            tools,
            events,
            active: Arc::new(DashMap::new()),
            default_model: None,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Default model alias for tasks that name none
    #[must_use]
    pub fn with_default_model(mut self, alias: Option<String>) -> Self {
        self.default_model = alias;
        self
    }

    /// Agent turn cap
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Context builder used for prompts
    #[must_use]
    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }

    /// Number of runs with a live cancellation handle
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Model id for an alias, falling back to the runner default
    #[must_use]
    pub fn model_id(&self, alias: Option<&str>) -> &'static str {
        resolve_model_id(alias.or(self.default_model.as_deref()))
    }

    /// Run one sub-agent to completion.
    ///
    /// The run gets its own handle derived from `turn`: cancelling `turn`
    /// interrupts it, cancelling the run leaves siblings untouched.
    #[tracing::instrument(skip_all, fields(agent = %task.agent_kind, project_id = %project.id))]
    pub async fn run(
        &self,
        project: &Project,
        task: AgentTask,
        cache: &ExecutionContextCache,
        turn: &CancellationToken,
    ) -> SubAgentResult {
        let model = self.model_id(task.model.as_deref());
        let mut run = AgentRun::new(&project.id, task.agent_kind, model, &task.task)
            .with_parent(task.parent_run_id.clone());

        let token = turn.child_token();
        self.active.insert(run.id.clone(), token.clone());

        let outcome = self.execute(&mut run, project, &task, cache, &token).await;
        self.active.remove(&run.id);

        let (status, error) = match &outcome {
            Ok(o) => (o.status(), None),
            Err(_) if token.is_cancelled() => (RunStatus::Interrupted, None),
            Err(e) => {
                error!(error = %e, run_id = %run.id, "Sub-agent run failed");
                (RunStatus::Failed, Some(e.to_string()))
            }
        };
        if let Ok(o) = outcome {
            self.apply_outcome(&mut run, &o);
        }
        self.finalize(&mut run, status).await;

        SubAgentResult {
            run_id: run.id.clone(),
            agent_kind: run.agent_kind,
            status: run.status,
            response_text: run.response_text.clone().unwrap_or_default(),
            cost_usd: run.cost_usd,
            tokens: run.total_tokens(),
            error,
        }
    }

    async fn execute(
        &self,
        run: &mut AgentRun,
        project: &Project,
        task: &AgentTask,
        cache: &ExecutionContextCache,
        token: &CancellationToken,
    ) -> Result<SessionOutcome> {
        let definition = agent_definition(task.agent_kind)
            .ok_or_else(|| Error::InvalidData(format!("{} cannot run as a sub-agent", task.agent_kind)))?;

        self.store.create_run(run).await?;
        run.start();
        self.store.update_run(run).await?;
        self.events.publish(OrchestratorEvent::AgentStarted {
            agent_id: run.id.clone(),
            project_id: project.id.clone(),
            agent_kind: run.agent_kind,
            task: run.task.clone(),
        });
        info!(run_id = %run.id, "Sub-agent started");

        let package = self
            .context
            .build_context_package(project, task.agent_kind, &task.task, task.hint_overrides.as_ref(), cache)
            .await?;
        self.events.publish(OrchestratorEvent::AgentContext {
            agent_id: run.id.clone(),
            project_id: project.id.clone(),
            sections: package.sections,
        });

        let mut request = SessionRequest::new(&task.task)
            .with_system_prompt(package.system_prompt)
            .with_allowed_tools(definition.tool_list())
            .with_model(run.model.clone())
            .with_max_turns(self.max_turns);
        if let Some(dir) = &project.directory_path {
            request = request.with_cwd(dir);
        }

        self.drive_session(&run.id, &project.id, request, token).await
    }

    /// Drain a session, streaming tokens and tracking tool calls, until it
    /// ends or `token` fires.
    pub(crate) async fn drive_session(
        &self,
        run_id: &str,
        project_id: &str,
        request: SessionRequest,
        token: &CancellationToken,
    ) -> Result<SessionOutcome> {
        let mut outcome = SessionOutcome::default();
        if token.is_cancelled() {
            outcome.interrupted = true;
            return Ok(outcome);
        }

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => {
                outcome.interrupted = true;
                return Ok(outcome);
            }
            started = self.sessions.start(request) => started?,
        };

        let mut streamed = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    outcome.interrupted = true;
                    break;
                }
                next = stream.next() => next,
            };
            let Some(event) = next else { break };

            match event? {
                SessionEvent::SessionStarted { session_id } => {
                    outcome.session_id = Some(session_id);
                }
                SessionEvent::TextDelta { text } => {
                    streamed.push_str(&text);
                    self.events.publish(OrchestratorEvent::ChatToken {
                        project_id: project_id.to_string(),
                        agent_id: run_id.to_string(),
                        token: text,
                    });
                }
                SessionEvent::AssistantText { text } => {
                    outcome.text.push_str(&text);
                }
                SessionEvent::ToolUse {
                    tool_use_id,
                    tool_name,
                    input,
                } => {
                    self.tools.start(run_id, &tool_use_id, &tool_name, &input).await;
                }
                SessionEvent::ToolResult {
                    tool_use_id,
                    output,
                    is_error,
                } => {
                    self.tools.complete(&tool_use_id, &output, is_error).await;
                }
                SessionEvent::TurnComplete(summary) => {
                    outcome.summary = Some(summary);
                }
            }
        }

        if outcome.text.is_empty() {
            outcome.text = match outcome.summary.as_ref().and_then(|s| s.result.clone()) {
                Some(result) => result,
                None => streamed,
            };
        }
        Ok(outcome)
    }

    fn apply_outcome(&self, run: &mut AgentRun, outcome: &SessionOutcome) {
        if !outcome.text.is_empty() {
            run.response_text = Some(outcome.text.clone());
        }
        if let Some(summary) = &outcome.summary {
            run.cost_usd = summary.cost_usd;
            run.input_tokens = summary.input_tokens;
            run.output_tokens = summary.output_tokens;
        }
    }

    /// Set the terminal status, persist and broadcast. Persistence errors
    /// are logged so the caller always gets a result.
    pub(crate) async fn finalize(&self, run: &mut AgentRun, status: RunStatus) {
        if run.status == RunStatus::Idle {
            run.start();
        }
        run.finish(status);
        self.tools.abandon_run(&run.id).await;
        if let Some(text) = &run.response_text {
            run.result_summary = Some(truncate_chars(text, RESULT_SUMMARY_CHARS).to_string());
        }
        if let Err(e) = self.store.update_run(run).await {
            error!(error = %e, run_id = %run.id, "Failed to persist run status");
        }
        self.events.publish(OrchestratorEvent::AgentStopped {
            agent_id: run.id.clone(),
            project_id: run.project_id.clone(),
            status: run.status,
        });
        info!(run_id = %run.id, status = %run.status, "Agent stopped");
    }

    /// Cancel one run.
    ///
    /// Without a live handle the stored status is re-broadcast, and a run
    /// still marked running is finalised as interrupted. Returns false only
    /// for unknown runs.
    pub async fn interrupt(&self, run_id: &str) -> Result<bool> {
        if let Some((_, token)) = self.active.remove(run_id) {
            token.cancel();
            info!(run_id = %run_id, "Agent interrupted");
            return Ok(true);
        }

        let Some(mut run) = self.store.get_run(run_id).await? else {
            return Ok(false);
        };
        if run.status == RunStatus::Running {
            warn!(run_id = %run_id, "Finalising stale running agent");
            self.finalize(&mut run, RunStatus::Interrupted).await;
        } else {
            self.events.publish(OrchestratorEvent::AgentStopped {
                agent_id: run.id.clone(),
                project_id: run.project_id.clone(),
                status: run.status,
            });
        }
        Ok(true)
    }
}
