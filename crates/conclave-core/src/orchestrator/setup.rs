//! Setup mode
//!
//! Until a project finishes setup, every turn is one settings-aware
//! session that walks the user through six questions. The session id is
//! stored on the project so the next turn resumes the same conversation.

use super::core::Orchestrator;
use super::TurnOutcome;
use crate::agents::SessionOutcome;
use crate::error::Result;
use crate::event_bus::OrchestratorEvent;
use crate::model::{AgentRun, MessageRole, Project, RunStatus, StoredMessage};
use crate::settings::qualified_tool_names;
use crate::store::ProjectStore;
use conclave_llm::SessionRequest;
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const ROOT_DIR_PLACEHOLDER: &str = "{{ROOT_DIR_INFO}}";

/// Messages of setup history replayed into the prompt
pub const SETUP_HISTORY_MESSAGES: usize = 50;

const SETUP_SYSTEM_PROMPT: &str = r#"You are a friendly project setup assistant. Your job is to guide the user through setting up a new project by asking a few quick questions. Keep it conversational and brief.

## Setup Flow

Ask these questions **one at a time**, waiting for the user's response before moving to the next:

1. **Project basics**: Ask for a project name (required), brief description, and purpose. Use the `set_project_info` tool to save the answers.

2. **Project directory**: Ask how they want to set up the project directory:
   - **Create new**: Create a fresh directory (use `setup_project_directory` with mode "create")
   - **Clone a repo**: Clone from a Git URL (use `setup_project_directory` with mode "clone")
   - **Use existing**: Point to an existing directory on disk (use `setup_project_directory` with mode "existing")
   {{ROOT_DIR_INFO}}

3. **Tech stack**: Ask about the project's technology choices in one broad question: language, frameworks, databases, testing, package manager, build tools, and linting/formatting. Parse all mentions from the user's response and save EVERY technology immediately:
   - Primary language & architecture: `set_project_info` (primaryLanguage, architecturePattern)
   - Frameworks & libraries: `update_project_settings(category: "techStack")` with role "framework", "library", "runtime", etc.
   - Databases: `update_project_settings(category: "databases")`
   - Package manager: `update_project_settings(category: "packageManager")`
   - Build tools: `update_project_settings(category: "build")`
   - Testing frameworks: `update_project_settings(category: "testing")`
   - Linters/formatters: `update_project_settings(category: "linting")`
   Don't ask for confirmation. Just save them.

4. **Conventions & standards**: Suggest sensible defaults based on the tech stack from step 3, and ask the user to accept, modify, or skip. Cover:
   - Naming conventions: `update_project_settings(category: "namingConventions")`
   - Coding standards: `update_project_settings(category: "codingStandards")`
   - Git conventions (commit style, branch naming pattern, default branch): `update_project_settings(category: "git")`
   - Error handling patterns: `update_project_settings(category: "errorHandling")`
   Present 3-5 suggested defaults as a short list the user can accept with "looks good" or modify. Save immediately after the user responds.

5. **AI preferences** (optional): Ask if they have any preferences for how the AI assistant should work with their code. Save with `update_project_settings` using the "ai" category.

6. **Complete**: When done (or if the user says "skip" at any point), call `complete_project_setup`.

## Rules
- Ask **one question at a time**.
- Keep responses short (2-3 sentences max per question).
- If the user says "skip" or wants to skip remaining questions, immediately call `complete_project_setup`.
- Save answers immediately using the appropriate tools. Don't wait until the end.
- Start with a brief welcome message and the first question."#;

const SETTINGS_TOOLS_PROMPT: &str = r#"

## Project Settings Tools

Use the project settings tools proactively to persist project decisions as the user discusses them.

### Available Tools
- **get_project_settings**: Read current settings. Provide a category name or omit to get all.
- **update_project_settings**: Update a metadata category with merge/replace/remove modes.
- **set_project_info**: Update top-level fields (title, description, purpose, primaryLanguage, architecturePattern).

### Category Mapping Guide
- Framework/library choices: techStack
- Package manager: packageManager
- Monorepo tool: monorepoTool
- Commit conventions and branch naming: git
- Linters/formatters: linting
- Test frameworks: testing
- Database choices: databases
- API style decisions: apiEndpoints
- Deployment/infra: environments, ciCd, infraAsCode
- Coding rules: codingStandards
- File naming: namingConventions
- Error handling patterns: errorHandling
- Logging framework: logging
- Auth decisions: security
- Architecture style: set_project_info (architecturePattern) or designPatterns
- Project language: set_project_info (primaryLanguage)
- Build tools: build
- Key libraries: keyDependencies

### Behavior
- When the user mentions a technology decision, update settings without being asked.
- Read settings first when you need context about what's already configured.
- Use merge mode by default, remove mode when the user drops something, replace mode only to overwrite a whole category.
- Keep confirmations brief: "Updated tech stack" not a paragraph."#;

fn non_empty_array(value: Option<&Value>) -> bool {
    value.and_then(Value::as_array).is_some_and(|a| !a.is_empty())
}

fn json_or(value: Option<&Value>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), Value::to_string)
}

/// "Progress So Far" and "Previous Conversation" sections for a resumed setup
#[must_use]
pub fn build_setup_progress(project: &Project, history: &[StoredMessage]) -> String {
    let meta = &project.metadata;
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let steps = [
        !project.title.is_empty() || project.description.is_some() || project.purpose.is_some(),
        project.directory_path.is_some(),
        project.primary_language.is_some() || non_empty_array(meta.get("techStack")),
        non_empty_array(meta.get("namingConventions"))
            || non_empty_array(meta.get("codingStandards"))
            || meta.get("git").is_some_and(|v| !v.is_null()),
        meta.get("ai").is_some_and(|v| !v.is_null()),
    ];

    let mut lines = Vec::new();
    if steps[0] {
        lines.push(format!(
            "- Step 1 (Project basics): DONE. name: \"{}\", description: \"{}\", purpose: \"{}\"",
            project.title,
            opt(&project.description),
            opt(&project.purpose)
        ));
    }
    if steps[1] {
        lines.push(format!(
            "- Step 2 (Project directory): DONE. {}",
            opt(&project.directory_path)
        ));
    }
    if steps[2] {
        lines.push(format!(
            "- Step 3 (Tech stack): DONE. language: \"{}\", techStack: {}, databases: {}",
            opt(&project.primary_language),
            json_or(meta.get("techStack"), "[]"),
            json_or(meta.get("databases"), "[]")
        ));
    }
    if steps[3] {
        lines.push(format!(
            "- Step 4 (Conventions): DONE. namingConventions: {}, codingStandards: {}, git: {}",
            json_or(meta.get("namingConventions"), "[]"),
            json_or(meta.get("codingStandards"), "[]"),
            json_or(meta.get("git"), "null")
        ));
    }
    if steps[4] {
        lines.push(format!(
            "- Step 5 (AI preferences): DONE. {}",
            json_or(meta.get("ai"), "null")
        ));
    }

    let mut section = String::new();
    if !lines.is_empty() {
        let next = steps.iter().position(|done| !done).map_or(6, |i| i + 1);
        section.push_str(&format!("\n\n## Progress So Far\n{}\n\n", lines.join("\n")));
        if next <= 5 {
            section.push_str(&format!(
                "Resume from step {next}. Do NOT re-ask completed questions. Do NOT repeat the welcome message.\n"
            ));
        } else {
            section.push_str("All questions answered. Call `complete_project_setup` to finish.\n");
        }
    }

    if !history.is_empty() {
        let convo = history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        section.push_str(&format!(
            "\n\n## Previous Conversation\n{convo}\n\nContinue naturally from where the conversation left off.\n"
        ));
    }
    section
}

/// Full system prompt for a setup session
#[must_use]
pub fn build_setup_prompt(project: &Project, history: &[StoredMessage], projects_root: Option<&Path>) -> String {
    let root_info = match projects_root {
        Some(root) => format!("The projects root directory is configured as: {}", root.display()),
        None => "No projects root directory is configured yet. The directory can be set to any absolute path."
            .to_string(),
    };
    format!(
        "{}{}{}",
        SETUP_SYSTEM_PROMPT.replace(ROOT_DIR_PLACEHOLDER, &root_info),
        build_setup_progress(project, history),
        SETTINGS_TOOLS_PROMPT
    )
}

impl Orchestrator {
    /// Run one setup turn, resuming the stored session when there is one.
    pub(super) async fn handle_setup_mode(
        &self,
        project: &Project,
        content: &str,
        model_alias: &str,
        run: &mut AgentRun,
        turn: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let history = self.store.recent_messages(&project.id, SETUP_HISTORY_MESSAGES).await?;
        if self.settings_tools.is_none() {
            warn!(project_id = %project.id, "Setup session has no settings tools; answers will not be saved");
        }
        let prompt = build_setup_prompt(project, &history, self.config.projects_root.as_deref());
        let model_id = self.runner.model_id(Some(model_alias));

        let build_request = |resume: Option<String>| {
            let mut request = SessionRequest::new(content)
                .with_system_prompt(prompt.clone())
                .with_model(model_id)
                .with_max_turns(self.config.setup_max_turns)
                .with_resume(resume);
            if let Some(dir) = &project.directory_path {
                request = request.with_cwd(dir);
            }
            if let Some(launcher) = &self.settings_tools {
                request = request
                    .with_mcp_server(launcher.server_for(&project.id))
                    .with_allowed_tools(qualified_tool_names());
            }
            request
        };

        let stored = project.sdk_session_id.clone();
        let first = self
            .runner
            .drive_session(&run.id, &project.id, build_request(stored.clone()), turn)
            .await;

        let outcome = match (first, stored) {
            (Ok(outcome), _) => outcome,
            (Err(e), Some(session_id)) => {
                warn!(error = %e, session_id = %session_id, "Setup session resume failed, retrying fresh");
                self.store.set_sdk_session_id(&project.id, None).await?;
                self.runner
                    .drive_session(&run.id, &project.id, build_request(None), turn)
                    .await?
            }
            (Err(e), None) => return Err(e),
        };

        self.finish_setup_turn(project, run, outcome).await
    }

    async fn finish_setup_turn(
        &self,
        project: &Project,
        run: &mut AgentRun,
        outcome: SessionOutcome,
    ) -> Result<TurnOutcome> {
        if let Some(session_id) = &outcome.session_id {
            self.store.set_sdk_session_id(&project.id, Some(session_id)).await?;
            info!(project_id = %project.id, session_id = %session_id, "Setup session captured");
        }

        let status = outcome.status();
        if let Some(summary) = &outcome.summary {
            run.cost_usd = summary.cost_usd;
            run.input_tokens = summary.input_tokens;
            run.output_tokens = summary.output_tokens;
        }

        if !outcome.text.is_empty() {
            run.response_text = Some(outcome.text.clone());
            if status != RunStatus::Interrupted {
                self.events.publish(OrchestratorEvent::ChatMessage {
                    project_id: project.id.clone(),
                    role: MessageRole::Assistant,
                    content: outcome.text.clone(),
                });
            }
            self.store
                .append_message(
                    &StoredMessage::new(&project.id, MessageRole::Assistant, &outcome.text).with_agent(&run.id),
                )
                .await?;
        }

        let tokens = run.total_tokens();
        if tokens > 0 || run.cost_usd > 0.0 {
            self.store.add_usage(&project.id, tokens, run.cost_usd).await?;
        }

        self.runner.finalize(run, status).await;
        Ok(TurnOutcome {
            run_id: run.id.clone(),
            status,
            response: outcome.text,
            sub_agents: Vec::new(),
        })
    }
}
