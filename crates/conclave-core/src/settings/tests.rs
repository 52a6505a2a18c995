use super::*;
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::Project;
use crate::store::{ProjectStore, SqliteStore};
use conclave_memory::{MemoryCategory, MemoryScope, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn array(kind: &str) -> MergeKind {
    MergeKind::for_category(kind)
}

// ── Merge kinds ─────────────────────────────────────────────

#[test]
fn test_merge_kind_table() {
    assert_eq!(MergeKind::for_category("tags"), MergeKind::TagSet);
    assert_eq!(MergeKind::for_category("techStack"), MergeKind::Array(IDENTIFIER_FIELDS));
    assert_eq!(MergeKind::for_category("git"), MergeKind::Object);
    assert_eq!(MergeKind::for_category("packageManager"), MergeKind::Primitive);
    assert_eq!(MergeKind::for_category("architecturePattern"), MergeKind::Primitive);
}

#[test]
fn test_identifier_priority() {
    let item = json!({"title": "t", "name": "n"});
    assert_eq!(identifier_of(&item, IDENTIFIER_FIELDS), Some("n"));
    assert_eq!(identifier_of(&json!({"x": 1}), IDENTIFIER_FIELDS), None);
    assert_eq!(identifier_of(&json!("plain"), IDENTIFIER_FIELDS), None);
}

// ── Merge ───────────────────────────────────────────────────

#[test]
fn test_merge_is_idempotent_for_identified_items() {
    let incoming = json!([{"name": "axum", "version": "0.7"}]);
    let once = apply_update(None, incoming.clone(), array("techStack"), UpdateMode::Merge);
    let twice = apply_update(Some(&once), incoming, array("techStack"), UpdateMode::Merge);
    assert_eq!(once, twice);
    assert_eq!(twice.as_array().unwrap().len(), 1);
}

#[test]
fn test_merge_patches_matching_item() {
    let current = json!([{"name": "axum", "version": "0.6", "isPrimary": true}, {"name": "tokio"}]);
    let merged = apply_update(
        Some(&current),
        json!({"name": "axum", "version": "0.7"}),
        array("techStack"),
        UpdateMode::Merge,
    );
    assert_eq!(
        merged,
        json!([{"name": "axum", "version": "0.7", "isPrimary": true}, {"name": "tokio"}])
    );
}

#[test]
fn test_merge_appends_unidentified_items() {
    let current = json!([{"description": "a"}]);
    let merged = apply_update(
        Some(&current),
        json!([{"description": "a"}]),
        array("goals"),
        UpdateMode::Merge,
    );
    assert_eq!(merged.as_array().unwrap().len(), 2);
}

#[test]
fn test_tag_merge_is_a_set() {
    let current = json!(["b", "c"]);
    let merged = apply_update(Some(&current), json!(["a", "b"]), array("tags"), UpdateMode::Merge);
    let mut tags: Vec<_> = merged
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    tags.sort();
    assert_eq!(tags, vec!["a", "b", "c"]);
}

#[test]
fn test_object_merge_is_shallow() {
    let current = json!({"branch": "main", "hooks": {"pre": true}});
    let merged = apply_update(
        Some(&current),
        json!({"hooks": {"post": true}, "remote": "origin"}),
        MergeKind::Object,
        UpdateMode::Merge,
    );
    assert_eq!(
        merged,
        json!({"branch": "main", "hooks": {"post": true}, "remote": "origin"})
    );
}

#[test]
fn test_primitive_merge_replaces() {
    let merged = apply_update(Some(&json!("npm")), json!("pnpm"), MergeKind::Primitive, UpdateMode::Merge);
    assert_eq!(merged, json!("pnpm"));
}

// ── Replace and remove ──────────────────────────────────────

#[test]
fn test_replace_coerces_array_categories() {
    let replaced = apply_update(
        Some(&json!([{"name": "old"}])),
        json!({"name": "new"}),
        array("services"),
        UpdateMode::Replace,
    );
    assert_eq!(replaced, json!([{"name": "new"}]));

    let object = apply_update(Some(&json!({"a": 1})), json!({"b": 2}), MergeKind::Object, UpdateMode::Replace);
    assert_eq!(object, json!({"b": 2}));
}

#[test]
fn test_remove_by_identifier() {
    let current = json!([{"rule": "no-unwrap"}, {"rule": "fmt"}, {"note": "kept"}]);
    let removed = apply_update(
        Some(&current),
        json!({"rule": "fmt"}),
        array("codingStandards"),
        UpdateMode::Remove,
    );
    assert_eq!(removed, json!([{"rule": "no-unwrap"}, {"note": "kept"}]));
}

#[test]
fn test_remove_tags_and_keys() {
    let tags = apply_update(Some(&json!(["a", "b"])), json!("a"), array("tags"), UpdateMode::Remove);
    assert_eq!(tags, json!(["b"]));

    let object = apply_update(
        Some(&json!({"a": 1, "b": 2})),
        json!({"a": null}),
        MergeKind::Object,
        UpdateMode::Remove,
    );
    assert_eq!(object, json!({"b": 2}));

    let cleared = apply_update(Some(&json!("npm")), Value::Null, MergeKind::Primitive, UpdateMode::Remove);
    assert_eq!(cleared, Value::Null);
}

#[test]
fn test_update_mode_parse() {
    assert_eq!("replace".parse::<UpdateMode>().unwrap(), UpdateMode::Replace);
    assert!("upsert".parse::<UpdateMode>().is_err());
}

#[test]
fn test_sanitize_dir_name() {
    assert_eq!(sanitize_dir_name("My Cool App!"), "my-cool-app");
    assert_eq!(sanitize_dir_name("--"), "project");
    assert_eq!(sanitize_dir_name("api_v2"), "api_v2");
}

// ── Service ─────────────────────────────────────────────────

struct Fixture {
    service: SettingsService,
    store: Arc<SqliteStore>,
    memory: MemoryStore,
    events: EventBus,
    project: Project,
}

async fn fixture() -> Fixture {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let memory = MemoryStore::in_memory().await.unwrap();
    let events = EventBus::default();
    let project = Project::new("ws1", "shop");
    store.create_project(&project).await.unwrap();
    let service = SettingsService::new(store.clone(), memory.clone(), events.clone());
    Fixture {
        service,
        store,
        memory,
        events,
        project,
    }
}

#[tokio::test]
async fn test_update_before_setup_writes_settings() {
    let fx = fixture().await;
    let mut rx = fx.events.subscribe();

    let outcome = fx
        .service
        .update_project_settings(
            &fx.project.id,
            "codingStandards",
            json!({"rule": "no-unwrap"}),
            UpdateMode::Merge,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, SettingsUpdate::Applied { .. }));

    let value = fx
        .service
        .get_project_settings(&fx.project.id, Some("codingStandards"))
        .await
        .unwrap();
    assert_eq!(value, json!([{"rule": "no-unwrap"}]));

    match rx.recv().await.unwrap() {
        OrchestratorEvent::ProjectSettingsUpdated {
            category,
            data,
            full_metadata,
            project_fields,
            ..
        } => {
            assert_eq!(category.as_deref(), Some("codingStandards"));
            assert_eq!(data, json!([{"rule": "no-unwrap"}]));
            assert_eq!(full_metadata.get("codingStandards"), Some(&data));
            assert!(project_fields.is_none());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_update_after_setup_redirects_to_memory() {
    let fx = fixture().await;
    fx.service.complete_project_setup(&fx.project.id).await.unwrap();

    let outcome = fx
        .service
        .update_project_settings(
            &fx.project.id,
            "knownIssues",
            json!({"title": "flaky ci"}),
            UpdateMode::Merge,
        )
        .await
        .unwrap();

    let entry = match outcome {
        SettingsUpdate::Redirected { entry, notice } => {
            assert!(notice.contains("\"knownIssues\" category is now stable"));
            assert!(notice.contains("(issue)"));
            entry
        }
        other => panic!("expected redirect, got {other:?}"),
    };
    assert_eq!(entry.category, MemoryCategory::Issue);
    assert_eq!(entry.scope, MemoryScope::Project);
    assert_eq!(entry.key, "knownIssues: {\"title\":\"flaky ci\"}");
    assert!(entry.content.starts_with("[From settings update - knownIssues] {"));

    let settings = fx
        .service
        .get_project_settings(&fx.project.id, Some("knownIssues"))
        .await
        .unwrap();
    assert_eq!(settings, Value::Null);
    assert_eq!(fx.memory.count("ws1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_redirect_key_is_truncated() {
    let fx = fixture().await;
    fx.service.complete_project_setup(&fx.project.id).await.unwrap();

    let long = "x".repeat(300);
    let outcome = fx
        .service
        .update_project_settings(&fx.project.id, "domainConcepts", json!(long), UpdateMode::Merge)
        .await
        .unwrap();
    match outcome {
        SettingsUpdate::Redirected { entry, .. } => assert_eq!(entry.key.chars().count(), 100),
        other => panic!("expected redirect, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_overlapping_category_after_setup_is_written() {
    let fx = fixture().await;
    fx.service.complete_project_setup(&fx.project.id).await.unwrap();

    let outcome = fx
        .service
        .update_project_settings(&fx.project.id, "tags", json!(["rust"]), UpdateMode::Merge)
        .await
        .unwrap();
    assert!(matches!(outcome, SettingsUpdate::Applied { .. }));
}

#[tokio::test]
async fn test_complete_setup_is_one_way() {
    let fx = fixture().await;
    assert!(fx.service.complete_project_setup(&fx.project.id).await.unwrap());
    assert!(!fx.service.complete_project_setup(&fx.project.id).await.unwrap());
}

#[tokio::test]
async fn test_set_project_info() {
    let fx = fixture().await;
    let mut rx = fx.events.subscribe();
    let changed = fx
        .service
        .set_project_info(
            &fx.project.id,
            ProjectInfoUpdate {
                purpose: Some("sell things".to_string()),
                primary_language: Some("Rust".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(changed, vec!["purpose", "primaryLanguage"]);

    let project = fx.store.get_project(&fx.project.id).await.unwrap().unwrap();
    assert_eq!(project.primary_language.as_deref(), Some("Rust"));

    match rx.recv().await.unwrap() {
        OrchestratorEvent::ProjectSettingsUpdated {
            category,
            data,
            project_fields,
            ..
        } => {
            assert!(category.is_none());
            assert_eq!(data, json!({"purpose": "sell things", "primaryLanguage": "Rust"}));
            assert_eq!(Some(data.as_object().unwrap()), project_fields.as_ref());
        }
        other => panic!("unexpected event {other:?}"),
    }

    let none = fx
        .service
        .set_project_info(&fx.project.id, ProjectInfoUpdate::default())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_setup_directory_create_and_existing() {
    let fx = fixture().await;
    let root = TempDir::new().unwrap();
    let service = fx
        .service
        .clone()
        .with_projects_root(Some(root.path().to_path_buf()));

    let first = service
        .setup_project_directory(&fx.project.id, DirectorySetup::Create { name: "Shop App".to_string() })
        .await
        .unwrap();
    let second = service
        .setup_project_directory(&fx.project.id, DirectorySetup::Create { name: "Shop App".to_string() })
        .await
        .unwrap();
    assert!(first.ends_with("shop-app"));
    assert!(second.ends_with("shop-app-2"));

    let existing = service
        .setup_project_directory(
            &fx.project.id,
            DirectorySetup::Existing { path: first.display().to_string() },
        )
        .await
        .unwrap();
    assert_eq!(existing, first);

    let project = fx.store.get_project(&fx.project.id).await.unwrap().unwrap();
    assert_eq!(project.directory_path.as_deref(), Some(first.to_str().unwrap()));
}

#[tokio::test]
async fn test_setup_directory_requires_root() {
    let fx = fixture().await;
    let err = fx
        .service
        .setup_project_directory(&fx.project.id, DirectorySetup::Create { name: "x".to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, crate::Error::Configuration(_)));
}

// ── Tool surface ────────────────────────────────────────────

#[test]
fn test_tool_names_are_qualified_by_server() {
    let names = qualified_tool_names();
    assert_eq!(names.len(), settings_tool_definitions().len());
    assert!(names.contains(&"mcp__project-settings__complete_project_setup".to_string()));

    let server = SettingsToolLauncher::new("/bin/conclave", vec!["mcp".to_string()]).server_for("p1");
    assert_eq!(server.name, SETTINGS_SERVER_NAME);
    assert_eq!(server.args, vec!["mcp", "--project", "p1"]);
}

#[tokio::test]
async fn test_setup_session_tools_persist_answers() {
    let fx = fixture().await;
    let tools = SettingsTools::new(fx.service.clone(), &fx.project.id);

    let reply = tools
        .call(
            "set_project_info",
            json!({"title": "storefront", "primaryLanguage": "Rust"}),
        )
        .await;
    assert!(!reply.is_error, "{}", reply.text);
    assert_eq!(reply.text, "Updated project info: title, primaryLanguage");

    let reply = tools
        .call(
            "update_project_settings",
            json!({"category": "techStack", "data": {"name": "axum", "role": "framework"}}),
        )
        .await;
    assert!(reply.text.starts_with("Updated techStack (merge)"), "{}", reply.text);

    let reply = tools.call("get_project_settings", json!({"category": "techStack"})).await;
    let listed: Value = serde_json::from_str(&reply.text).unwrap();
    assert_eq!(listed, json!([{"name": "axum", "role": "framework"}]));

    let reply = tools.call("complete_project_setup", Value::Null).await;
    assert_eq!(reply.text, "Project setup completed.");

    let project = fx.store.get_project(&fx.project.id).await.unwrap().unwrap();
    assert_eq!(project.title, "storefront");
    assert_eq!(project.primary_language.as_deref(), Some("Rust"));
    assert!(project.setup_completed);

    // Overlapping categories are redirected once setup is done
    let reply = tools
        .call(
            "update_project_settings",
            json!({"category": "codingStandards", "data": {"rule": "no-unwrap"}}),
        )
        .await;
    assert!(reply.text.contains("is now stable"), "{}", reply.text);
}

#[tokio::test]
async fn test_tool_errors_are_replies() {
    let fx = fixture().await;
    let tools = SettingsTools::new(fx.service.clone(), &fx.project.id);

    let reply = tools.call("setup_project_directory", json!({"mode": "clone"})).await;
    assert!(reply.is_error);
    assert!(reply.text.contains("repo_url is required"));

    let reply = tools.call("update_project_settings", json!({"data": 1})).await;
    assert!(reply.is_error);
    assert!(reply.text.contains("bad tool arguments"));

    let reply = tools.call("drop_database", json!({})).await;
    assert!(reply.is_error);

    let missing = SettingsTools::new(fx.service.clone(), "no-such-project");
    assert!(missing.call("get_project_settings", json!({})).await.is_error);
}
