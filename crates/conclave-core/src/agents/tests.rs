use super::*;
use crate::context::{ContextBuilder, ExecutionContextCache, SummaryCache};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{AgentKind, Project, RunStatus, ToolStatus};
use crate::store::{ProjectStore, RunStore, SqliteStore};
use crate::test_support::{reply, ScriptedSessions, SessionScript};
use conclave_llm::{SessionEvent, TurnSummary};
use conclave_memory::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Fixture {
    runner: AgentRunner,
    sessions: Arc<ScriptedSessions>,
    store: Arc<SqliteStore>,
    events: EventBus,
    project: Project,
}

async fn fixture(sessions: ScriptedSessions) -> Fixture {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let memory = MemoryStore::in_memory().await.unwrap();
    let events = EventBus::default();
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();

    let sessions = Arc::new(sessions);
    let context = ContextBuilder::new(store.clone(), memory, SummaryCache::new());
    let runner = AgentRunner::new(sessions.clone(), store.clone(), context, events.clone());
    Fixture {
        runner,
        sessions,
        store,
        events,
        project,
    }
}

// ── Definitions ─────────────────────────────────────────────

#[test]
fn test_definitions_cover_sub_agents() {
    for kind in AgentKind::SUB_AGENTS {
        assert!(agent_definition(kind).is_some());
    }
    assert!(agent_definition(AgentKind::Orchestrator).is_none());

    let analyst = agent_definition(AgentKind::CodeAnalyst).unwrap();
    assert_eq!(analyst.allowed_tools, &["Read", "Grep", "Glob"]);
    let researcher = agent_definition(AgentKind::Researcher).unwrap();
    assert!(!researcher.default_hints.workspace_files);
    assert!(researcher.default_hints.memory);
    let tests = agent_definition(AgentKind::TestRunner).unwrap();
    assert!(!tests.default_hints.memory && !tests.default_hints.conversation);
}

#[test]
fn test_hint_overrides() {
    let hints = ContextHints::ALL.with_overrides(&ContextHintOverrides {
        summary: Some(false),
        ..Default::default()
    });
    assert!(!hints.summary);
    assert!(hints.memory);
}

// ── Runner ──────────────────────────────────────────────────

#[tokio::test]
async fn test_run_completes_and_records_usage() {
    let fx = fixture(ScriptedSessions::replying("found 3 modules")).await;
    let mut rx = fx.events.subscribe();

    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::CodeAnalyst, "map the modules").with_parent("orch-1"),
            &ExecutionContextCache::new(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.response_text, "found 3 modules");
    assert_eq!(result.tokens, 150);
    assert!((result.cost_usd - 0.01).abs() < f64::EPSILON);

    let stored = fx.store.get_run(&result.run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.parent_run_id.as_deref(), Some("orch-1"));
    assert_eq!(stored.result_summary.as_deref(), Some("found 3 modules"));

    let request = &fx.sessions.requests()[0];
    assert_eq!(request.allowed_tools, vec!["Read", "Grep", "Glob"]);
    assert!(request.system_prompt.contains("## Your Task\nmap the modules"));

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec!["agent:started", "agent:context", "chat:token", "agent:stopped"]
    );
    assert_eq!(fx.runner.active_count(), 0);
}

#[tokio::test]
async fn test_session_error_becomes_failed_result() {
    let fx = fixture(ScriptedSessions::new(|_| SessionScript::Fail("spawn failed".to_string()))).await;

    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::Implementer, "edit"),
            &ExecutionContextCache::new(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error.unwrap().contains("spawn failed"));
    let stored = fx.store.get_run(&result.run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_unsuccessful_turn_is_failed() {
    let fx = fixture(ScriptedSessions::new(|_| {
        SessionScript::Events(vec![SessionEvent::TurnComplete(TurnSummary {
            success: false,
            ..Default::default()
        })])
    }))
    .await;

    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::TestRunner, "cargo test"),
            &ExecutionContextCache::new(),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(result.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_tool_calls_are_tracked() {
    let fx = fixture(ScriptedSessions::new(|_| {
        let mut events = vec![
            SessionEvent::ToolUse {
                tool_use_id: "tu-1".to_string(),
                tool_name: "Read".to_string(),
                input: json!({"file_path": "src/lib.rs"}),
            },
            SessionEvent::ToolResult {
                tool_use_id: "tu-1".to_string(),
                output: json!("x".repeat(MAX_TOOL_OUTPUT_BYTES + 10)),
                is_error: false,
            },
            SessionEvent::ToolResult {
                tool_use_id: "unknown".to_string(),
                output: json!("ignored"),
                is_error: true,
            },
        ];
        events.extend(reply("done"));
        SessionScript::Events(events)
    }))
    .await;
    let mut rx = fx.events.subscribe();

    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::CodeAnalyst, "read lib"),
            &ExecutionContextCache::new(),
            &CancellationToken::new(),
        )
        .await;

    let invocations = fx.store.list_tool_invocations(&result.run_id).await.unwrap();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].status, ToolStatus::Completed);
    let output = invocations[0].output.as_deref().unwrap();
    assert!(output.ends_with("...(truncated)"));
    assert_eq!(output.len(), MAX_TOOL_OUTPUT_BYTES + "...(truncated)".len());

    let mut tool_id = None;
    let mut result_id = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            OrchestratorEvent::AgentTool { id, status, .. } => {
                assert_eq!(status, ToolStatus::Running);
                tool_id = Some(id);
            }
            OrchestratorEvent::AgentToolResult { tool_call_id, .. } => result_id = Some(tool_call_id),
            _ => {}
        }
    }
    assert!(tool_id.is_some());
    assert_eq!(tool_id, result_id);
}

#[tokio::test]
async fn test_abandon_run_clears_only_that_run() {
    let fx = fixture(ScriptedSessions::replying("unused")).await;
    let tracker = ToolTracker::new(fx.store.clone(), fx.events.clone());
    let input = json!({"command": "cargo test"});
    tracker.start("run-a", "tu-1", "Bash", &input).await;
    tracker.start("run-a", "tu-2", "Read", &input).await;
    tracker.start("run-b", "tu-3", "Bash", &input).await;

    assert_eq!(tracker.abandon_run("run-a").await, 2);
    assert_eq!(tracker.pending_count(), 1);
    assert_eq!(tracker.abandon_run("run-a").await, 0);

    for invocation in fx.store.list_tool_invocations("run-a").await.unwrap() {
        assert_eq!(invocation.status, ToolStatus::Failed);
    }
    let other = fx.store.list_tool_invocations("run-b").await.unwrap();
    assert_eq!(other[0].status, ToolStatus::Running);
}

#[tokio::test]
async fn test_interrupted_run_fails_open_tool_calls() {
    let fx = fixture(ScriptedSessions::new(|_| {
        SessionScript::Hang(vec![SessionEvent::ToolUse {
            tool_use_id: "tu-1".to_string(),
            tool_name: "Bash".to_string(),
            input: json!({"command": "sleep 600"}),
        }])
    }))
    .await;
    let mut rx = fx.events.subscribe();

    let runner = fx.runner.clone();
    let project = fx.project.clone();
    let handle = tokio::spawn(async move {
        runner
            .run(
                &project,
                AgentTask::new(AgentKind::CodeAnalyst, "long command"),
                &ExecutionContextCache::new(),
                &CancellationToken::new(),
            )
            .await
    });

    let run_id = loop {
        if let OrchestratorEvent::AgentTool { agent_id, .. } = rx.recv().await.unwrap() {
            break agent_id;
        }
    };
    assert!(fx.runner.interrupt(&run_id).await.unwrap());
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.status, RunStatus::Interrupted);

    let invocations = fx.store.list_tool_invocations(&run_id).await.unwrap();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].status, ToolStatus::Failed);
}

#[tokio::test]
async fn test_run_cancellation_is_interrupted() {
    let fx = fixture(ScriptedSessions::new(|_| {
        SessionScript::Hang(vec![SessionEvent::AssistantText {
            text: "partial".to_string(),
        }])
    }))
    .await;
    let mut rx = fx.events.subscribe();
    let turn = CancellationToken::new();

    let runner = fx.runner.clone();
    let project = fx.project.clone();
    let turn_clone = turn.clone();
    let handle = tokio::spawn(async move {
        runner
            .run(
                &project,
                AgentTask::new(AgentKind::CodeAnalyst, "long task"),
                &ExecutionContextCache::new(),
                &turn_clone,
            )
            .await
    });

    let run_id = loop {
        if let OrchestratorEvent::AgentStarted { agent_id, .. } = rx.recv().await.unwrap() {
            break agent_id;
        }
    };
    assert!(fx.runner.interrupt(&run_id).await.unwrap());

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.status, RunStatus::Interrupted);
    assert_eq!(result.response_text, "partial");
    assert!(!turn.is_cancelled());
}

#[tokio::test]
async fn test_turn_cancellation_interrupts_run() {
    let fx = fixture(ScriptedSessions::new(|_| SessionScript::Hang(Vec::new()))).await;
    let turn = CancellationToken::new();
    turn.cancel();

    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::Researcher, "search"),
            &ExecutionContextCache::new(),
            &turn,
        )
        .await;
    assert_eq!(result.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_interrupt_without_handle_resyncs() {
    let fx = fixture(ScriptedSessions::replying("ok")).await;
    let result = fx
        .runner
        .run(
            &fx.project,
            AgentTask::new(AgentKind::CodeAnalyst, "t"),
            &ExecutionContextCache::new(),
            &CancellationToken::new(),
        )
        .await;

    let mut rx = fx.events.subscribe();
    assert!(fx.runner.interrupt(&result.run_id).await.unwrap());
    match rx.recv().await.unwrap() {
        OrchestratorEvent::AgentStopped { status, .. } => assert_eq!(status, RunStatus::Completed),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!fx.runner.interrupt("missing").await.unwrap());
}

#[tokio::test]
async fn test_interrupt_finalises_stale_running_run() {
    let fx = fixture(ScriptedSessions::replying("ok")).await;
    let mut run = crate::model::AgentRun::new(&fx.project.id, AgentKind::Implementer, "m", "t");
    run.start();
    fx.store.create_run(&run).await.unwrap();

    assert!(fx.runner.interrupt(&run.id).await.unwrap());
    let stored = fx.store.get_run(&run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Interrupted);
}
