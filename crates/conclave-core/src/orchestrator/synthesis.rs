//! Synthesis phase
//!
//! Zero outputs give a fixed notice, one output is returned verbatim, and
//! only several outputs cost an extra completion.

use super::core::Orchestrator;
use crate::agents::SubAgentResult;
use crate::model::Project;
use conclave_llm::CompletionRequest;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reply when no sub-agent produced output
pub const NO_OUTPUT_MESSAGE: &str =
    "I was unable to complete the requested task. The sub-agents did not produce output.";

const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You synthesize results from development agents into clear, helpful responses.";

const DEFAULT_SYNTHESIS_HINT: &str =
    "Combine the results into a clear, coherent response for the user.";

/// User prompt for the synthesis completion
#[must_use]
pub fn build_synthesis_prompt(
    project: &Project,
    user_message: &str,
    results: &[SubAgentResult],
    hint: Option<&str>,
) -> String {
    let sections = results
        .iter()
        .map(|r| {
            let text = if r.response_text.is_empty() {
                "(no output)"
            } else {
                r.response_text.as_str()
            };
            format!("### {} ({})\n{}", r.agent_kind, r.status, text)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are synthesizing results from sub-agents for the project \"{title}\".\n\n\
         The user asked: \"{user_message}\"\n\n\
         ## Sub-Agent Results\n{sections}\n\n\
         ## Synthesis Instructions\n{hint}\n\n\
         Provide a concise, helpful response that addresses the user's original request. \
         Reference specific findings from the agents. Do not mention the agents themselves; \
         present the information naturally.",
        title = project.title,
        hint = hint.unwrap_or(DEFAULT_SYNTHESIS_HINT),
    )
}

/// Plain join used when the synthesis reply is empty or cancelled
#[must_use]
pub fn join_responses(results: &[SubAgentResult]) -> String {
    results
        .iter()
        .map(|r| r.response_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Labelled concatenation used when the synthesis call fails
#[must_use]
pub fn labelled_concatenation(results: &[SubAgentResult]) -> String {
    results
        .iter()
        .map(|r| format!("## {}\n{}", r.agent_kind, r.response_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Orchestrator {
    /// Combine the outputs of several agents. `results` only holds runs
    /// that produced text.
    pub(super) async fn synthesize_results(
        &self,
        project: &Project,
        user_message: &str,
        results: &[SubAgentResult],
        hint: Option<&str>,
        model_id: &str,
        turn: &CancellationToken,
    ) -> String {
        info!(project_id = %project.id, outputs = results.len(), "Synthesizing results");

        let request = CompletionRequest::new(model_id)
            .with_system(SYNTHESIS_SYSTEM_PROMPT)
            .with_user(build_synthesis_prompt(project, user_message, results, hint))
            .with_max_tokens(self.config.synthesis_max_tokens);

        let reply = tokio::select! {
            biased;
            _ = turn.cancelled() => return join_responses(results),
            reply = self.completion.complete(request) => reply,
        };

        match reply {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => join_responses(results),
            Err(e) => {
                error!(error = %e, "Synthesis call failed, concatenating results");
                labelled_concatenation(results)
            }
        }
    }
}
