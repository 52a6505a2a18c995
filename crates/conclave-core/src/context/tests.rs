use super::*;
use crate::model::{AgentKind, MessageRole, Project, StoredMessage};
use crate::store::{ProjectStore, SqliteStore};
use conclave_memory::{MemoryCategory, MemoryStore, NewKnowledgeEntry};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

// ── Cached ──────────────────────────────────────────────────

#[test]
fn test_cached_distinguishes_absent_from_unfetched() {
    let unfetched: Cached<String> = Cached::NotFetched;
    assert_eq!(unfetched.get(), None);
    assert!(!unfetched.is_fetched());

    let empty: Cached<String> = Cached::Fetched(None);
    assert_eq!(empty.get(), Some(None));
    assert!(empty.is_fetched());
}

// ── Project context ─────────────────────────────────────────

#[test]
fn test_build_project_context() {
    let mut project = Project::new("ws1", "shop");
    project.purpose = Some("sell things".to_string());
    project.primary_language = Some("Rust".to_string());
    project.metadata.insert(
        "ai".to_string(),
        json!({"customInstructions": "be brief", "avoidPaths": ["target", "vendor"]}),
    );
    project.metadata.insert(
        "codingStandards".to_string(),
        json!([{"rule": "r1", "description": "d1"}, {"rule": "r2", "description": "d2"}]),
    );
    project.metadata.insert("services".to_string(), json!([{"name": "api"}, {"name": "worker"}]));
    project.metadata.insert(
        "techStack".to_string(),
        json!([{"name": "axum", "version": "0.7", "isPrimary": true}, {"name": "serde"}]),
    );

    let ctx = build_project_context(&project).unwrap();
    assert_eq!(
        ctx,
        "Name: shop\nPurpose: sell things\nPrimary language: Rust\n\nAI Instructions: be brief\n\
Avoid paths: target, vendor\n\nConventions:\n- r1: d1\n- r2: d2\nServices: api, worker\n\
Tech stack: axum 0.7"
    );
}

#[test]
fn test_project_context_caps_coding_standards() {
    let mut project = Project::new("ws1", "p");
    let standards: Vec<_> = (0..8).map(|i| json!({"rule": format!("r{i}"), "description": "d"})).collect();
    project.metadata.insert("codingStandards".to_string(), json!(standards));
    let ctx = build_project_context(&project).unwrap();
    assert!(ctx.contains("- r4: d"));
    assert!(!ctx.contains("- r5: d"));
}

// ── Summary cache ───────────────────────────────────────────

#[test]
fn test_summary_objective_and_files() {
    let cache = SummaryCache::new();
    cache.update_from_response("p1", "add login", "I created `src/login.rs` and modified Cargo.toml");
    cache.update_from_response("p1", "add logout", "Edited src/login.rs again");

    let summary = cache.structured("p1").unwrap();
    assert_eq!(summary.objective.as_deref(), Some("add login"));
    assert_eq!(summary.files_modified, vec!["src/login.rs", "Cargo.toml"]);
    assert_eq!(summary.completed_steps, vec!["add login", "add logout"]);

    let rendered = cache.summary("p1").unwrap();
    assert!(rendered.starts_with("Objective: add login\nCompleted: add login; add logout"));
}

#[test]
fn test_summary_truncation_limits() {
    let cache = SummaryCache::new();
    let long = "x".repeat(250);
    cache.update_from_response("p1", &long, "");
    let summary = cache.structured("p1").unwrap();
    let objective = summary.objective.unwrap();
    assert_eq!(objective.chars().count(), 200);
    assert!(objective.ends_with("..."));
    assert_eq!(summary.completed_steps[0].chars().count(), 100);

    for i in 0..15 {
        cache.update_from_response("p1", &format!("step {i}"), "");
    }
    let summary = cache.structured("p1").unwrap();
    assert_eq!(summary.completed_steps.len(), 10);
    assert_eq!(summary.completed_steps[0], "step 5");
}

#[test]
fn test_summary_render_cap() {
    let cache = SummaryCache::new();
    for i in 0..60 {
        cache.update_from_response("p1", "m", &format!("wrote file_{i:03}_with_a_long_name.rs"));
    }
    for _ in 0..40 {
        cache.note_issue("p1", "y".repeat(80));
    }
    let rendered = cache.summary("p1").unwrap();
    assert_eq!(rendered.chars().count(), MAX_SUMMARY_LENGTH);
    assert_eq!(cache.structured("p1").unwrap().files_modified.len(), 20);
}

#[test]
fn test_summary_notes_and_clear() {
    let cache = SummaryCache::new();
    cache.note_decision("p1", "use sqlite");
    assert_eq!(cache.summary("p1").unwrap(), "Decisions: use sqlite");
    cache.clear("p1");
    assert!(cache.summary("p1").is_none());
}

// ── Workspace files ─────────────────────────────────────────

#[tokio::test]
async fn test_workspace_files_roundtrip() {
    let dir = TempDir::new().unwrap();
    let mut files = WorkspaceFiles::load(dir.path()).await.unwrap();
    assert!(files.context().is_none());

    files.save_conventions_md("use tabs").await.unwrap();
    files.save_project_md("shop api").await.unwrap();

    let reloaded = WorkspaceFiles::load(dir.path()).await.unwrap();
    assert_eq!(reloaded.project_md(), Some("shop api"));
    assert_eq!(
        reloaded.context().unwrap(),
        "### Project\nshop api\n\n### Conventions\nuse tabs"
    );
}

// ── Context package ─────────────────────────────────────────

async fn builder() -> (ContextBuilder, Arc<SqliteStore>, MemoryStore) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let memory = MemoryStore::in_memory().await.unwrap();
    let builder = ContextBuilder::new(store.clone(), memory.clone(), SummaryCache::new());
    (builder, store, memory)
}

#[tokio::test]
async fn test_package_sections_follow_hints() {
    let (builder, store, memory) = builder().await;
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();
    memory
        .create(NewKnowledgeEntry::new("ws1", MemoryCategory::Fact, "currency", "prices are cents"))
        .await
        .unwrap();

    let cache = ExecutionContextCache::new();
    let package = builder
        .build_context_package(&project, AgentKind::TestRunner, "run the currency tests", None, &cache)
        .await
        .unwrap();

    let names: Vec<_> = package.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["System Prompt", "Task", "Project Knowledge", "Workspace Files", "Session Summary", "Conversation"]
    );
    // test-runner skips memory, summary and conversation
    assert!(!package.system_prompt.contains("prices are cents"));
    assert!(!package.sections[4].included);
    assert!(!package.sections[5].included);
    assert!(package.system_prompt.contains("## Your Task\nrun the currency tests"));
    assert!(package.system_prompt.contains("## Project Knowledge\nName: shop"));
}

#[tokio::test]
async fn test_package_includes_memory_and_conversation() {
    let (builder, store, memory) = builder().await;
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();
    store
        .append_message(&StoredMessage::new(&project.id, MessageRole::User, "z".repeat(600)))
        .await
        .unwrap();
    memory
        .create(NewKnowledgeEntry::new("ws1", MemoryCategory::Fact, "currency", "prices are cents"))
        .await
        .unwrap();

    let cache = ExecutionContextCache::new();
    let package = builder
        .build_context_package(&project, AgentKind::CodeAnalyst, "explain currency handling", None, &cache)
        .await
        .unwrap();

    assert!(package.system_prompt.contains("- **currency**: prices are cents"));
    let expected = format!("## Recent Conversation\nuser: {}...", "z".repeat(500));
    assert!(package.system_prompt.contains(&expected));
}

#[tokio::test]
async fn test_shared_blocks_fetched_once_per_turn() {
    let (builder, store, _memory) = builder().await;
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();
    store
        .append_message(&StoredMessage::new(&project.id, MessageRole::User, "first"))
        .await
        .unwrap();

    let cache = ExecutionContextCache::new();
    builder
        .build_context_package(&project, AgentKind::CodeAnalyst, "a", None, &cache)
        .await
        .unwrap();

    store
        .append_message(&StoredMessage::new(&project.id, MessageRole::User, "second"))
        .await
        .unwrap();
    let package = builder
        .build_context_package(&project, AgentKind::Implementer, "b", None, &cache)
        .await
        .unwrap();
    assert!(!package.system_prompt.contains("second"));

    let fresh = builder
        .build_context_package(&project, AgentKind::Implementer, "b", None, &ExecutionContextCache::new())
        .await
        .unwrap();
    assert!(fresh.system_prompt.contains("user: second"));
}

#[tokio::test]
async fn test_overrides_and_orchestrator_rejected() {
    let (builder, store, _memory) = builder().await;
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();
    let cache = ExecutionContextCache::new();

    let overrides = crate::agents::ContextHintOverrides {
        project_context: Some(false),
        memory: Some(false),
        ..Default::default()
    };
    let package = builder
        .build_context_package(&project, AgentKind::Researcher, "x", Some(&overrides), &cache)
        .await
        .unwrap();
    assert!(!package.sections[2].included);
    assert!(!package.system_prompt.contains("## Project Knowledge"));

    assert!(builder
        .build_context_package(&project, AgentKind::Orchestrator, "x", None, &cache)
        .await
        .is_err());
}
