use super::*;
use crate::agents::AgentRunner;
use crate::context::{ContextBuilder, SummaryCache};
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{AgentKind, MessageRole, Project, RunStatus};
use crate::settings::{SettingsToolLauncher, SETTINGS_SERVER_NAME};
use crate::store::{ProjectStore, RunStore, SqliteStore};
use crate::test_support::{reply, ScriptedCompletion, ScriptedSessions, SessionScript};
use async_trait::async_trait;
use conclave_llm::SessionEvent;
use conclave_memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DELEGATE_TWO: &str = r#"{"agents":[
    {"agentType":"code-analyst","taskDescription":"look around"},
    {"agentType":"implementer","taskDescription":"make the change"}
], "synthesisHint":"lead with the change"}"#;

struct Fixture {
    orchestrator: Arc<Orchestrator>,
    completion: Arc<ScriptedCompletion>,
    sessions: Arc<ScriptedSessions>,
    store: Arc<SqliteStore>,
    events: EventBus,
    project: Project,
}

struct FixtureBuilder {
    completion: ScriptedCompletion,
    sessions: ScriptedSessions,
    config: OrchestratorConfig,
    setup_completed: bool,
    extractor: Option<Arc<dyn KnowledgeExtractor>>,
    settings_tools: Option<SettingsToolLauncher>,
}

impl FixtureBuilder {
    fn new(answers: Vec<std::result::Result<&str, &str>>, sessions: ScriptedSessions) -> Self {
        Self {
            completion: ScriptedCompletion::new(answers),
            sessions,
            config: OrchestratorConfig::default(),
            setup_completed: true,
            extractor: None,
            settings_tools: None,
        }
    }

    fn in_setup(mut self) -> Self {
        self.setup_completed = false;
        self
    }

    fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    fn extractor(mut self, extractor: Arc<dyn KnowledgeExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    fn settings_tools(mut self, launcher: SettingsToolLauncher) -> Self {
        self.settings_tools = Some(launcher);
        self
    }

    async fn build(self) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let memory = MemoryStore::in_memory().await.unwrap();
        let events = EventBus::default();
        let mut project = Project::new("ws1", "shop");
        project.purpose = Some("sell things".to_string());
        project.setup_completed = self.setup_completed;
        store.create_project(&project).await.unwrap();

        let completion = Arc::new(self.completion);
        let sessions = Arc::new(self.sessions);
        let context = ContextBuilder::new(store.clone(), memory.clone(), SummaryCache::new());
        let runner = AgentRunner::new(sessions.clone(), store.clone(), context, events.clone());
        let mut orchestrator =
            Orchestrator::new(completion.clone(), runner, store.clone(), events.clone(), self.config);
        if let Some(extractor) = self.extractor {
            orchestrator = orchestrator.with_extractor(extractor);
        }
        if let Some(launcher) = self.settings_tools {
            orchestrator = orchestrator.with_settings_tools(launcher);
        }

        Fixture {
            orchestrator: Arc::new(orchestrator),
            completion,
            sessions,
            store,
            events,
            project,
        }
    }
}

impl Fixture {
    async fn send(&self, message: &str) -> Result<TurnOutcome> {
        self.orchestrator
            .handle_message(&self.project.id, message, MessageOptions::default())
            .await
    }
}

/// Records extraction requests on a channel
struct RecordingExtractor {
    tx: mpsc::UnboundedSender<(String, ExtractionComplexity)>,
}

#[async_trait]
impl KnowledgeExtractor for RecordingExtractor {
    async fn extract(
        &self,
        _workspace_id: &str,
        project_id: &str,
        _response: &str,
        complexity: ExtractionComplexity,
    ) -> Result<usize> {
        let _ = self.tx.send((project_id.to_string(), complexity));
        Ok(0)
    }
}

async fn next_sub_agent_start(rx: &mut tokio::sync::broadcast::Receiver<OrchestratorEvent>) -> String {
    loop {
        if let OrchestratorEvent::AgentStarted {
            agent_id, agent_kind, ..
        } = rx.recv().await.unwrap()
        {
            if agent_kind != AgentKind::Orchestrator {
                return agent_id;
            }
        }
    }
}

// ── Routing parse ───────────────────────────────────────────

#[test]
fn test_parse_direct_response() {
    let decision = parse_route_response(r#"{"directResponse":"Hi"}"#, "hello");
    assert_eq!(decision, RouteDecision::Direct("Hi".to_string()));
}

#[test]
fn test_parse_fenced_delegation() {
    let reply = "```json\n{\"agents\":[{\"agentType\":\"test-runner\",\"taskDescription\":\"run tests\"}]}\n```";
    match parse_route_response(reply, "run them") {
        RouteDecision::Delegate {
            agents,
            synthesis_hint,
        } => {
            assert_eq!(agents.len(), 1);
            assert_eq!(agents[0].agent_kind, AgentKind::TestRunner);
            assert_eq!(agents[0].task_description, "run tests");
            assert!(synthesis_hint.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_parse_prose_falls_back_to_code_analyst() {
    let decision = parse_route_response("Sure, let me look into that for you.", "why is login slow?");
    assert_eq!(decision, RouteDecision::fallback("why is login slow?"));
}

#[test]
fn test_parse_unknown_agents_fall_back() {
    let reply = r#"{"agents":[{"agentType":"orchestrator","taskDescription":"x"},{"agentType":"poet","taskDescription":"y"}]}"#;
    assert_eq!(parse_route_response(reply, "msg"), RouteDecision::fallback("msg"));

    let missing_task = r#"{"agents":[{"agentType":"implementer"}]}"#;
    assert_eq!(parse_route_response(missing_task, "msg"), RouteDecision::fallback("msg"));
}

#[test]
fn test_routing_prompt_truncates_history() {
    let project = Project::new("ws1", "shop");
    let history = vec![
        crate::model::StoredMessage::new(&project.id, MessageRole::User, "a".repeat(400)),
        crate::model::StoredMessage::new(&project.id, MessageRole::Assistant, "short"),
    ];
    let prompt = build_routing_prompt(&project, &history, 300);
    assert!(prompt.starts_with("You are a routing agent for the project \"shop\".\nProject purpose: General development"));
    assert!(prompt.contains(&format!("user: {}...\nassistant: short", "a".repeat(300))));
    assert!(prompt.contains("- **code-analyst**: "));
    assert!(prompt.ends_with("Respond ONLY with JSON. No other text."));

    let bare = build_routing_prompt(&project, &[], 300);
    assert!(!bare.contains("## Recent Conversation"));
}

// ── Turns ───────────────────────────────────────────────────

#[tokio::test]
async fn test_direct_routing_creates_no_sub_agents() {
    let fx = FixtureBuilder::new(
        vec![Ok(r#"{"directResponse":"Hello! How can I help?"}"#)],
        ScriptedSessions::replying("unused"),
    )
    .build()
    .await;

    let outcome = fx.send("hi there").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "Hello! How can I help?");

    let runs = fx.store.list_runs(&fx.project.id).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].agent_kind, AgentKind::Orchestrator);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert!(fx.sessions.requests().is_empty());

    let messages = fx.store.recent_messages(&fx.project.id, 10).await.unwrap();
    let assistant: Vec<_> = messages.iter().filter(|m| m.role == MessageRole::Assistant).collect();
    assert_eq!(assistant.len(), 1);
    assert_eq!(assistant[0].content, "Hello! How can I help?");
    assert_eq!(assistant[0].agent_id.as_deref(), Some(outcome.run_id.as_str()));

    let summary = fx.orchestrator.runner().context().summaries().structured(&fx.project.id);
    assert_eq!(summary.unwrap().objective.as_deref(), Some("hi there"));
}

#[tokio::test]
async fn test_prose_routing_delegates_message_to_code_analyst() {
    let fx = FixtureBuilder::new(
        vec![Ok("I think you should check the auth module.")],
        ScriptedSessions::replying("The auth module retries three times."),
    )
    .build()
    .await;

    let outcome = fx.send("why is login slow?").await.unwrap();
    assert_eq!(outcome.sub_agents.len(), 1);
    assert_eq!(outcome.sub_agents[0].agent_kind, AgentKind::CodeAnalyst);
    assert_eq!(fx.sessions.requests()[0].prompt, "why is login slow?");

    // Single output is returned verbatim without a synthesis call
    assert_eq!(outcome.response, "The auth module retries three times.");
    assert_eq!(fx.completion.requests().len(), 1);
}

#[tokio::test]
async fn test_routing_call_failure_still_makes_progress() {
    let fx = FixtureBuilder::new(vec![Err("overloaded")], ScriptedSessions::replying("found it"))
        .build()
        .await;

    let outcome = fx.send("find the bug").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "found it");
}

#[tokio::test]
async fn test_multiple_outputs_are_synthesized() {
    let fx = FixtureBuilder::new(
        vec![Ok(DELEGATE_TWO), Ok("Here is the combined answer.")],
        ScriptedSessions::new(|req| {
            SessionScript::Events(reply(if req.prompt == "look around" {
                "analysis text"
            } else {
                "edited src/lib.rs"
            }))
        }),
    )
    .build()
    .await;

    let outcome = fx.send("add caching").await.unwrap();
    assert_eq!(outcome.response, "Here is the combined answer.");
    assert_eq!(outcome.sub_agents.len(), 2);

    let requests = fx.completion.requests();
    assert_eq!(requests.len(), 2);
    let synthesis = &requests[1];
    assert!(synthesis.user_content.contains("The user asked: \"add caching\""));
    assert!(synthesis.user_content.contains("### code-analyst (completed)\nanalysis text"));
    assert!(synthesis.user_content.contains("## Synthesis Instructions\nlead with the change"));

    // Usage from both agents rolls up into the run and the budget;
    // the routing and synthesis completions are not counted
    let run = fx.store.get_run(&outcome.run_id).await.unwrap().unwrap();
    assert_eq!(run.total_tokens(), 300);
    let budget = fx.store.get_budget(&fx.project.id).await.unwrap();
    assert_eq!(budget.tokens_used, 300);
    for result in &outcome.sub_agents {
        let sub = fx.store.get_run(&result.run_id).await.unwrap().unwrap();
        assert_eq!(sub.parent_run_id.as_deref(), Some(outcome.run_id.as_str()));
    }
}

#[tokio::test]
async fn test_synthesis_failure_concatenates_labelled_outputs() {
    let fx = FixtureBuilder::new(
        vec![Ok(DELEGATE_TWO), Err("synthesis down")],
        ScriptedSessions::new(|req| {
            SessionScript::Events(reply(if req.prompt == "look around" { "A" } else { "B" }))
        }),
    )
    .build()
    .await;

    let outcome = fx.send("add caching").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "## code-analyst\nA\n\n## implementer\nB");
}

#[tokio::test]
async fn test_no_output_gives_fixed_notice() {
    let fx = FixtureBuilder::new(
        vec![Ok(DELEGATE_TWO)],
        ScriptedSessions::new(|_| SessionScript::Fail("no binary".to_string())),
    )
    .build()
    .await;

    let outcome = fx.send("add caching").await.unwrap();
    assert_eq!(outcome.response, NO_OUTPUT_MESSAGE);
    assert!(outcome.sub_agents.iter().all(|r| r.status == RunStatus::Failed));
}

#[tokio::test]
async fn test_global_interrupt_stops_dispatch_and_keeps_partial() {
    let fx = FixtureBuilder::new(
        vec![Ok(DELEGATE_TWO)],
        ScriptedSessions::new(|_| {
            SessionScript::Hang(vec![
                SessionEvent::AssistantText {
                    text: "half done".to_string(),
                },
                SessionEvent::TextDelta {
                    text: "half done".to_string(),
                },
            ])
        }),
    )
    .build()
    .await;
    let mut rx = fx.events.subscribe();

    let orchestrator = fx.orchestrator.clone();
    let project_id = fx.project.id.clone();
    let handle = tokio::spawn(async move {
        orchestrator
            .handle_message(&project_id, "add caching", MessageOptions::default())
            .await
    });

    loop {
        if let OrchestratorEvent::ChatToken { .. } = rx.recv().await.unwrap() {
            break;
        }
    }
    assert!(fx.orchestrator.interrupt(&fx.project.id));

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert_eq!(outcome.sub_agents.len(), 1);
    assert_eq!(outcome.sub_agents[0].status, RunStatus::Interrupted);
    assert_eq!(outcome.response, "half done");
    assert_eq!(fx.sessions.requests().len(), 1);

    let run = fx.store.get_run(&outcome.run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    let messages = fx.store.recent_messages(&fx.project.id, 10).await.unwrap();
    assert_eq!(messages.last().unwrap().content, "half done");
    assert_eq!(fx.orchestrator.active_turn_count(), 0);
}

#[tokio::test]
async fn test_agent_interrupt_continues_with_next_agent() {
    let fx = FixtureBuilder::new(
        vec![Ok(DELEGATE_TWO)],
        ScriptedSessions::new(|req| {
            if req.prompt == "look around" {
                SessionScript::Hang(Vec::new())
            } else {
                SessionScript::Events(reply("change made"))
            }
        }),
    )
    .build()
    .await;
    let mut rx = fx.events.subscribe();

    let orchestrator = fx.orchestrator.clone();
    let project_id = fx.project.id.clone();
    let handle = tokio::spawn(async move {
        orchestrator
            .handle_message(&project_id, "add caching", MessageOptions::default())
            .await
    });

    let first = next_sub_agent_start(&mut rx).await;
    assert!(fx.orchestrator.interrupt_agent(&first).await.unwrap());

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.sub_agents[0].status, RunStatus::Interrupted);
    assert_eq!(outcome.sub_agents[1].status, RunStatus::Completed);
    assert_eq!(outcome.response, "change made");
}

#[tokio::test]
async fn test_interrupt_without_turn() {
    let fx = FixtureBuilder::new(vec![], ScriptedSessions::replying("x")).build().await;
    assert!(!fx.orchestrator.interrupt(&fx.project.id));
    assert!(fx.orchestrator.current_run_id(&fx.project.id).is_none());
}

#[tokio::test]
async fn test_budget_exceeded_rejects_turn() {
    let fx = FixtureBuilder::new(vec![], ScriptedSessions::replying("x"))
        .config(OrchestratorConfig::default().with_token_budget(100))
        .build()
        .await;
    fx.store.add_usage(&fx.project.id, 150, 0.5).await.unwrap();
    let mut rx = fx.events.subscribe();

    let err = fx.send("more work").await.unwrap_err();
    assert!(matches!(err, Error::BudgetExceeded { used: 150, budget: 100 }));
    assert!(matches!(rx.recv().await.unwrap(), OrchestratorEvent::ChatError { .. }));
    assert!(fx.store.list_runs(&fx.project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_project_is_not_found() {
    let fx = FixtureBuilder::new(vec![], ScriptedSessions::replying("x")).build().await;
    let err = fx
        .orchestrator
        .handle_message("nope", "hi", MessageOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_long_response_triggers_extraction() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let long = Box::leak("word ".repeat(40).into_boxed_str());
    let fx = FixtureBuilder::new(vec![Ok("prose")], ScriptedSessions::replying(long))
        .extractor(Arc::new(RecordingExtractor { tx }))
        .build()
        .await;

    fx.send("explain the module").await.unwrap();
    let (project_id, complexity) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project_id, fx.project.id);
    assert_eq!(complexity, ExtractionComplexity::Low);
}

#[tokio::test]
async fn test_short_response_skips_extraction() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fx = FixtureBuilder::new(vec![Ok(r#"{"directResponse":"ok"}"#)], ScriptedSessions::replying("x"))
        .extractor(Arc::new(RecordingExtractor { tx }))
        .build()
        .await;

    fx.send("thanks").await.unwrap();
    drop(fx);
    assert!(rx.recv().await.is_none());
}

// ── Setup mode ──────────────────────────────────────────────

#[tokio::test]
async fn test_setup_resume_failure_retries_fresh() {
    let fx = FixtureBuilder::new(
        vec![],
        ScriptedSessions::new(|req| match &req.resume {
            Some(_) => SessionScript::Fail("session not found".to_string()),
            None => SessionScript::Events(reply("Welcome! What should we call the project?")),
        }),
    )
    .in_setup()
    .build()
    .await;
    fx.store
        .set_sdk_session_id(&fx.project.id, Some("stale"))
        .await
        .unwrap();

    let outcome = fx.send("hello").await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "Welcome! What should we call the project?");

    let requests = fx.sessions.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].resume.as_deref(), Some("stale"));
    assert!(requests[1].resume.is_none());
    assert!(requests[1].system_prompt.contains("## Project Settings Tools"));
    assert!(requests[1].system_prompt.contains("## Previous Conversation\nuser: hello"));

    let project = fx.store.get_project(&fx.project.id).await.unwrap().unwrap();
    assert_eq!(project.sdk_session_id.as_deref(), Some("sess-1"));
    assert!(fx.completion.requests().is_empty());
}

#[tokio::test]
async fn test_setup_session_gets_settings_tool_server() {
    let fx = FixtureBuilder::new(vec![], ScriptedSessions::replying("What should we call it?"))
        .in_setup()
        .settings_tools(SettingsToolLauncher::new("/opt/conclave", vec!["mcp".to_string()]))
        .build()
        .await;

    fx.send("hi").await.unwrap();

    let requests = fx.sessions.requests();
    let servers = &requests[0].mcp_servers;
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].name, SETTINGS_SERVER_NAME);
    assert_eq!(servers[0].command, "/opt/conclave");
    assert_eq!(servers[0].args, vec!["mcp".to_string(), "--project".to_string(), fx.project.id.clone()]);
    assert!(requests[0]
        .allowed_tools
        .contains(&"mcp__project-settings__update_project_settings".to_string()));
}

#[tokio::test]
async fn test_setup_failure_without_session_is_reported() {
    let fx = FixtureBuilder::new(
        vec![],
        ScriptedSessions::new(|_| SessionScript::Fail("cli missing".to_string())),
    )
    .in_setup()
    .build()
    .await;

    assert!(fx.send("hello").await.is_err());
    assert_eq!(fx.sessions.requests().len(), 1);
    let runs = fx.store.list_runs(&fx.project.id).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[test]
fn test_setup_progress_resumes_at_first_open_step() {
    let mut project = Project::new("ws1", "shop");
    project.directory_path = Some("/srv/shop".to_string());
    project.primary_language = Some("Rust".to_string());

    let progress = build_setup_progress(&project, &[]);
    assert!(progress.contains("- Step 2 (Project directory): DONE. /srv/shop"));
    assert!(progress.contains("Resume from step 4."));
    assert!(!progress.contains("## Previous Conversation"));

    let prompt = build_setup_prompt(&project, &[], Some(std::path::Path::new("/srv")));
    assert!(prompt.contains("The projects root directory is configured as: /srv"));
    assert!(!prompt.contains("{{ROOT_DIR_INFO}}"));
}

// ── Extraction ──────────────────────────────────────────────

#[tokio::test]
async fn test_llm_extractor_files_project_entries() {
    let completion = Arc::new(ScriptedCompletion::new(vec![Ok(r#"```json
[
  {"category":"decision","key":"Use sqlx","content":"SQLite through sqlx."},
  {"category":"poem","key":"x","content":"y"},
  {"category":"fact","key":"Orders","content":"Orders ship daily."},
  {"category":"issue","key":"Flaky CI","content":"CI fails on Mondays."},
  {"category":"convention","key":"snake_case","content":"Files use snake_case."}
]
```"#)]));
    let memory = MemoryStore::in_memory().await.unwrap();
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let extractor = LlmKnowledgeExtractor::new(completion.clone(), memory.clone(), events, "model-x");

    let stored = extractor
        .extract("ws1", "p1", "long response", ExtractionComplexity::Low)
        .await
        .unwrap();
    assert_eq!(stored, 3);

    let entries = memory.list_by_project("p1").await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.source_project_id.as_deref() == Some("p1")));
    assert!(matches!(rx.recv().await.unwrap(), OrchestratorEvent::MemoryUpdated { .. }));
    assert!(completion.requests()[0].system.contains("at most 3"));
}

#[tokio::test]
async fn test_extraction_failure_stays_in_background() {
    let mut mock = MockKnowledgeExtractor::new();
    mock.expect_extract()
        .times(1)
        .returning(|_, _, _, _| Err(Error::Internal("model unavailable".to_string())));

    let handle = spawn_extraction(
        Arc::new(mock),
        "ws1".to_string(),
        "p1".to_string(),
        "text".to_string(),
        ExtractionComplexity::Medium,
    );
    assert!(handle.await.is_ok());
}

#[test]
fn test_extraction_complexity_thresholds() {
    assert_eq!(ExtractionComplexity::for_length(3000, 3000), ExtractionComplexity::Low);
    assert_eq!(ExtractionComplexity::for_length(3001, 3000), ExtractionComplexity::Medium);
    assert_eq!(ExtractionComplexity::Medium.max_entries(), 6);
}
