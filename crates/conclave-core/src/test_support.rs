//! Scripted collaborators shared by unit tests.

use async_trait::async_trait;
use conclave_llm::{
    CompletionRequest, CompletionResponse, CompletionService, SessionEvent, SessionRequest,
    SessionRunner, SessionStream, TokenUsage, TurnSummary,
};
use crate::error::{Error, Result};
use crate::model::{
    AgentRun, Plan, Project, ProjectBudget, StoredMessage, ToolInvocation, ToolStatus,
    WorkflowTemplate,
};
use crate::store::{PlanStore, ProjectStore, RunStore, SqliteStore, TemplateStore};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// What a scripted session does
pub(crate) enum SessionScript {
    /// Emit the events, then end
    Events(Vec<SessionEvent>),
    /// Fail to start
    Fail(String),
    /// Emit the events, then never end
    Hang(Vec<SessionEvent>),
}

/// Events of a successful single-message session
pub(crate) fn reply(text: &str) -> Vec<SessionEvent> {
    vec![
        SessionEvent::SessionStarted {
            session_id: "sess-1".to_string(),
        },
        SessionEvent::TextDelta {
            text: text.to_string(),
        },
        SessionEvent::AssistantText {
            text: text.to_string(),
        },
        SessionEvent::TurnComplete(TurnSummary {
            success: true,
            result: Some(text.to_string()),
            cost_usd: 0.01,
            input_tokens: 100,
            output_tokens: 50,
        }),
    ]
}

type Responder = Box<dyn Fn(&SessionRequest) -> SessionScript + Send + Sync>;

/// Session runner answering from a closure
pub(crate) struct ScriptedSessions {
    responder: Responder,
    requests: Mutex<Vec<SessionRequest>>,
}

impl ScriptedSessions {
    pub(crate) fn new(responder: impl Fn(&SessionRequest) -> SessionScript + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every session answers `text`
    pub(crate) fn replying(text: &'static str) -> Self {
        Self::new(move |_| SessionScript::Events(reply(text)))
    }

    pub(crate) fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionRunner for ScriptedSessions {
    async fn start(&self, request: SessionRequest) -> conclave_llm::Result<SessionStream> {
        let script = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        match script {
            SessionScript::Events(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            SessionScript::Fail(message) => Err(conclave_llm::Error::Session(message)),
            SessionScript::Hang(events) => Ok(stream::iter(events.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
        }
    }
}

/// Completion service returning queued answers in order
#[derive(Default)]
pub(crate) struct ScriptedCompletion {
    answers: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub(crate) fn new(answers: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> conclave_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted answer".to_string()));
        match answer {
            Ok(content) => Ok(CompletionResponse {
                content,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
                model: request.model,
            }),
            Err(message) => Err(conclave_llm::Error::Api(message)),
        }
    }
}

/// SQLite store with injectable write failures
pub(crate) struct FaultyStore {
    inner: SqliteStore,
    plan_updates: AtomicUsize,
    /// 1-based `update_plan` call that fails; 0 never fails
    fail_plan_update: AtomicUsize,
    fail_metadata: AtomicBool,
}

impl FaultyStore {
    pub(crate) async fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().await.unwrap(),
            plan_updates: AtomicUsize::new(0),
            fail_plan_update: AtomicUsize::new(0),
            fail_metadata: AtomicBool::new(false),
        }
    }

    /// Make the `nth` `update_plan` call from now on fail
    pub(crate) fn fail_plan_update(&self, nth: usize) {
        let done = self.plan_updates.load(Ordering::SeqCst);
        self.fail_plan_update.store(done + nth, Ordering::SeqCst);
    }

    pub(crate) fn fail_metadata_saves(&self, fail: bool) {
        self.fail_metadata.store(fail, Ordering::SeqCst);
    }

    fn injected(what: &str) -> Error {
        Error::Internal(format!("injected {what} failure"))
    }
}

#[async_trait]
impl RunStore for FaultyStore {
    async fn create_run(&self, run: &AgentRun) -> Result<()> {
        self.inner.create_run(run).await
    }
    async fn get_run(&self, id: &str) -> Result<Option<AgentRun>> {
        self.inner.get_run(id).await
    }
    async fn update_run(&self, run: &AgentRun) -> Result<()> {
        self.inner.update_run(run).await
    }
    async fn list_runs(&self, project_id: &str) -> Result<Vec<AgentRun>> {
        self.inner.list_runs(project_id).await
    }
    async fn create_tool_invocation(&self, invocation: &ToolInvocation) -> Result<()> {
        self.inner.create_tool_invocation(invocation).await
    }
    async fn complete_tool_invocation(
        &self,
        id: &str,
        output: &str,
        status: ToolStatus,
        duration_ms: u64,
    ) -> Result<()> {
        self.inner
            .complete_tool_invocation(id, output, status, duration_ms)
            .await
    }
    async fn list_tool_invocations(&self, run_id: &str) -> Result<Vec<ToolInvocation>> {
        self.inner.list_tool_invocations(run_id).await
    }
}

#[async_trait]
impl ProjectStore for FaultyStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.inner.create_project(project).await
    }
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.inner.get_project(id).await
    }
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.inner.list_projects().await
    }
    async fn update_project(&self, project: &Project) -> Result<()> {
        self.inner.update_project(project).await
    }
    async fn save_metadata(&self, project_id: &str, metadata: &Map<String, Value>) -> Result<()> {
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(Self::injected("metadata save"));
        }
        self.inner.save_metadata(project_id, metadata).await
    }
    async fn set_sdk_session_id(&self, project_id: &str, session_id: Option<&str>) -> Result<()> {
        self.inner.set_sdk_session_id(project_id, session_id).await
    }
    async fn mark_setup_completed(&self, project_id: &str) -> Result<bool> {
        self.inner.mark_setup_completed(project_id).await
    }
    async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        self.inner.append_message(message).await
    }
    async fn recent_messages(&self, project_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        self.inner.recent_messages(project_id, limit).await
    }
    async fn get_budget(&self, project_id: &str) -> Result<ProjectBudget> {
        self.inner.get_budget(project_id).await
    }
    async fn add_usage(&self, project_id: &str, tokens: u64, cost_usd: f64) -> Result<ProjectBudget> {
        self.inner.add_usage(project_id, tokens, cost_usd).await
    }
}

#[async_trait]
impl PlanStore for FaultyStore {
    async fn create_plan(&self, plan: &Plan) -> Result<()> {
        self.inner.create_plan(plan).await
    }
    async fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        self.inner.get_plan(id).await
    }
    async fn update_plan(&self, plan: &Plan) -> Result<()> {
        let call = self.plan_updates.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_plan_update.load(Ordering::SeqCst) {
            return Err(Self::injected("plan update"));
        }
        self.inner.update_plan(plan).await
    }
    async fn list_plans(&self, project_id: &str) -> Result<Vec<Plan>> {
        self.inner.list_plans(project_id).await
    }
}

#[async_trait]
impl TemplateStore for FaultyStore {
    async fn upsert_template(&self, template: &WorkflowTemplate) -> Result<()> {
        self.inner.upsert_template(template).await
    }
    async fn get_template(&self, id: &str) -> Result<Option<WorkflowTemplate>> {
        self.inner.get_template(id).await
    }
    async fn list_templates(&self, project_id: Option<&str>) -> Result<Vec<WorkflowTemplate>> {
        self.inner.list_templates(project_id).await
    }
    async fn delete_template(&self, id: &str) -> Result<bool> {
        self.inner.delete_template(id).await
    }
}
