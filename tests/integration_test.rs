//! Integration tests for Conclave
//!
//! These tests verify the integration between the crates:
//! - conclave-memory: Knowledge entries and search
//! - conclave-llm: Completion and session transports (scripted here)
//! - conclave-core: Orchestrator turns, promotion and workflow execution

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conclave_core::model::{PlanStatus, Project, StepStatus};
use conclave_core::store::{ProjectStore, RunStore};
use conclave_core::{
    AgentKind, AgentRunner, ContextBuilder, EventBus, MessageOptions, Orchestrator,
    OrchestratorConfig, OrchestratorEvent, PromotionService, RunStatus, SqliteStore, SummaryCache,
    WorkflowExecutor, WorkflowManager,
};
use conclave_llm::{
    CompletionRequest, CompletionResponse, CompletionService, SessionEvent, SessionRequest,
    SessionRunner, SessionStream, TokenUsage, TurnSummary,
};
use conclave_memory::{MemoryCategory, MemoryStore, NewKnowledgeEntry};
use futures::stream::{self, StreamExt};

// ============================================================================
// Scripted transports
// ============================================================================

/// Answers routing and synthesis calls from a queue
struct QueuedCompletion {
    answers: Mutex<VecDeque<String>>,
}

impl QueuedCompletion {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        }
    }
}

#[async_trait]
impl CompletionService for QueuedCompletion {
    async fn complete(&self, request: CompletionRequest) -> conclave_llm::Result<CompletionResponse> {
        let content = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| conclave_llm::Error::Api("no answer queued".to_string()))?;
        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                input_tokens: 20,
                output_tokens: 10,
            },
            model: request.model,
        })
    }
}

/// Every session replies with the same text and records its request
struct EchoSessions {
    reply: &'static str,
    requests: Mutex<Vec<SessionRequest>>,
}

impl EchoSessions {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionRunner for EchoSessions {
    async fn start(&self, request: SessionRequest) -> conclave_llm::Result<SessionStream> {
        self.requests.lock().unwrap().push(request);
        let events = vec![
            SessionEvent::SessionStarted {
                session_id: "sess-it".to_string(),
            },
            SessionEvent::AssistantText {
                text: self.reply.to_string(),
            },
            SessionEvent::TurnComplete(TurnSummary {
                success: true,
                result: Some(self.reply.to_string()),
                cost_usd: 0.02,
                input_tokens: 120,
                output_tokens: 80,
            }),
        ];
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

struct Services {
    store: Arc<SqliteStore>,
    memory: MemoryStore,
    events: EventBus,
    project: Project,
}

async fn services() -> Services {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let memory = MemoryStore::in_memory().await.unwrap();
    let events = EventBus::default();
    let mut project = Project::new("ws-it", "payments");
    project.purpose = Some("process card payments".to_string());
    project.setup_completed = true;
    store.create_project(&project).await.unwrap();
    Services {
        store,
        memory,
        events,
        project,
    }
}

fn runner(svc: &Services, sessions: Arc<EchoSessions>) -> AgentRunner {
    let context = ContextBuilder::new(svc.store.clone(), svc.memory.clone(), SummaryCache::new());
    AgentRunner::new(sessions, svc.store.clone(), context, svc.events.clone())
}

// ============================================================================
// Orchestrator + Memory Integration Tests
// ============================================================================

const DELEGATE_ANALYST: &str = r#"{"agents":[
    {"agentType":"code-analyst","taskDescription":"audit stripe webhooks handling"}
]}"#;

#[tokio::test]
async fn test_delegated_agent_sees_memory_then_promoted_settings() {
    let svc = services().await;
    let sessions = Arc::new(EchoSessions::new("Webhook handler lives in src/hooks.rs"));
    let orchestrator = Orchestrator::new(
        Arc::new(QueuedCompletion::new(&[DELEGATE_ANALYST, DELEGATE_ANALYST])),
        runner(&svc, sessions.clone()),
        svc.store.clone(),
        svc.events.clone(),
        OrchestratorConfig::default(),
    );
    let entry = svc
        .memory
        .create(NewKnowledgeEntry::new(
            &svc.project.workspace_id,
            MemoryCategory::Convention,
            "webhook retries",
            "Retry Stripe webhooks three times with backoff",
        ))
        .await
        .unwrap();

    // Before promotion the entry reaches the agent as workspace memory
    let outcome = orchestrator
        .handle_message(&svc.project.id, "are webhooks reliable?", MessageOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "Webhook handler lives in src/hooks.rs");
    let requests = sessions.requests();
    let first = &requests[0];
    assert_eq!(first.prompt, "audit stripe webhooks handling");
    assert!(first.system_prompt.contains("## Project Knowledge"));
    assert!(first
        .system_prompt
        .contains("- **webhook retries**: Retry Stripe webhooks three times with backoff"));

    // After promotion it comes from settings and the memory copy is suppressed
    let promotion = PromotionService::new(svc.store.clone(), svc.memory.clone(), svc.events.clone());
    let result = promotion
        .execute_promotion(&entry.id, &svc.project.id)
        .await
        .unwrap();
    assert_eq!(result.category, "codingStandards");

    orchestrator
        .handle_message(&svc.project.id, "check again", MessageOptions::default())
        .await
        .unwrap();
    let requests = sessions.requests();
    let second = &requests[1];
    assert!(second
        .system_prompt
        .contains("- webhook retries: Retry Stripe webhooks three times with backoff"));
    assert!(!second.system_prompt.contains("**webhook retries**"));

    let stored = svc.memory.get(&entry.id).await.unwrap().unwrap();
    assert!(stored.is_promoted());
}

#[tokio::test]
async fn test_direct_answer_is_persisted_and_broadcast() {
    let svc = services().await;
    let sessions = Arc::new(EchoSessions::new("unused"));
    let orchestrator = Orchestrator::new(
        Arc::new(QueuedCompletion::new(&[r#"{"directResponse":"Hi! Ask me about payments."}"#])),
        runner(&svc, sessions.clone()),
        svc.store.clone(),
        svc.events.clone(),
        OrchestratorConfig::default(),
    );
    let mut rx = svc.events.subscribe();

    let outcome = orchestrator
        .handle_message(&svc.project.id, "hello", MessageOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.response, "Hi! Ask me about payments.");
    assert!(outcome.sub_agents.is_empty());
    assert!(sessions.requests().is_empty());

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert!(names.contains(&"chat:message"));

    let runs = RunStore::list_runs(svc.store.as_ref(), &svc.project.id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].agent_kind, AgentKind::Orchestrator);
    assert_eq!(runs[0].id, outcome.run_id);
}

// ============================================================================
// Workflow Integration Tests
// ============================================================================

#[tokio::test]
async fn test_builtin_workflow_runs_to_completion() {
    let svc = services().await;
    let sessions = Arc::new(EchoSessions::new("Updated src/auth.rs; 5 tests passed"));
    let manager = WorkflowManager::new(svc.store.clone(), svc.events.clone());
    assert_eq!(manager.seed_builtins().await.unwrap(), 4);

    let plan = manager
        .create_from_template(&svc.project, "fix-bug", "login fails after password reset", None)
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Ready);
    assert_eq!(plan.title, "Fix Bug: login fails after password reset");

    let mut rx = svc.events.subscribe();
    let executor = WorkflowExecutor::new(runner(&svc, sessions.clone()), svc.store.clone(), svc.events.clone());
    let outcome = executor.execute(plan.clone(), &svc.project).await.unwrap();
    assert_eq!(outcome.status, PlanStatus::Completed);
    assert_eq!(outcome.tokens, 4 * 200);

    let done = manager.get_plan(&plan.id).await.unwrap();
    assert!(done.steps.iter().all(|s| s.status == StepStatus::Completed));
    let metadata = done.workflow_metadata.unwrap();
    assert_eq!(metadata.checkpoint_step_id.as_deref(), Some("verify-fix"));
    assert!(metadata.quality_gate_results.values().all(|r| r.passed));

    // Analysis and research run before the fix, verification runs last
    let prompts: Vec<String> = sessions.requests().into_iter().map(|r| r.prompt).collect();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[2].starts_with("[Workflow Step apply-fix]"));
    assert!(prompts[3].starts_with("[Workflow Step verify-fix]"));
    assert!(prompts[3].contains("User context: login fails after password reset"));

    let mut checkpoints = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, OrchestratorEvent::WorkflowCheckpoint { .. }) {
            checkpoints += 1;
        }
    }
    assert_eq!(checkpoints, 3);

    let runs = RunStore::list_runs(svc.store.as_ref(), &svc.project.id).await.unwrap();
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().any(|r| r.agent_kind == AgentKind::TestRunner));
}
