//! Routing phase
//!
//! One non-agentic completion decides between answering directly and
//! delegating to sub-agents. Anything the router returns that is not a
//! usable plan degrades to a single code-analyst delegation.

use super::core::Orchestrator;
use crate::agents::AGENT_DEFINITIONS;
use crate::model::{AgentKind, Project, StoredMessage};
use conclave_llm::util::truncate_with_ellipsis;
use conclave_llm::CompletionRequest;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One planned sub-agent dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAgent {
    /// Agent to run
    pub agent_kind: AgentKind,
    /// Task written by the router
    pub task_description: String,
}

/// What the router decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Answer without tools
    Direct(String),
    /// Run these agents in order
    Delegate {
        /// Planned dispatches
        agents: Vec<PlannedAgent>,
        /// How to combine the outputs
        synthesis_hint: Option<String>,
    },
}

impl RouteDecision {
    /// Delegate the raw message to the code analyst
    #[must_use]
    pub fn fallback(message: &str) -> Self {
        Self::Delegate {
            agents: vec![PlannedAgent {
                agent_kind: AgentKind::CodeAnalyst,
                task_description: message.to_string(),
            }],
            synthesis_hint: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRoute {
    Direct {
        #[serde(rename = "directResponse")]
        direct_response: String,
    },
    Delegate {
        agents: Vec<RawAgent>,
        #[serde(rename = "synthesisHint", default)]
        synthesis_hint: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawAgent {
    #[serde(rename = "agentType")]
    agent_type: String,
    #[serde(rename = "taskDescription")]
    task_description: String,
}

/// Remove a surrounding markdown code fence
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
        body = body.strip_suffix("```").unwrap_or(body);
    }
    body.trim()
}

/// Parse the router's reply. Never fails: unusable replies fall back to
/// the code analyst with the original message.
#[must_use]
pub fn parse_route_response(reply: &str, message: &str) -> RouteDecision {
    let raw: RawRoute = match serde_json::from_str(strip_code_fence(reply)) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Routing reply is not a valid plan, delegating to code-analyst");
            return RouteDecision::fallback(message);
        }
    };

    match raw {
        RawRoute::Direct { direct_response } => RouteDecision::Direct(direct_response),
        RawRoute::Delegate {
            agents,
            synthesis_hint,
        } => {
            let agents: Vec<PlannedAgent> = agents
                .into_iter()
                .filter_map(|a| {
                    let kind = a.agent_type.parse::<AgentKind>().ok()?;
                    AgentKind::SUB_AGENTS.contains(&kind).then(|| PlannedAgent {
                        agent_kind: kind,
                        task_description: a.task_description,
                    })
                })
                .collect();

            if agents.is_empty() {
                warn!("Routing plan named no known agents, delegating to code-analyst");
                return RouteDecision::fallback(message);
            }
            RouteDecision::Delegate {
                agents,
                synthesis_hint: synthesis_hint.filter(|h| !h.trim().is_empty()),
            }
        }
    }
}

/// Render the recent history the router sees
#[must_use]
pub fn format_routing_history(history: &[StoredMessage], max_chars: usize) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role, truncate_with_ellipsis(&m.content, max_chars, "...")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for the routing completion
#[must_use]
pub fn build_routing_prompt(project: &Project, history: &[StoredMessage], max_chars: usize) -> String {
    let agents = AGENT_DEFINITIONS
        .iter()
        .map(|d| format!("- **{}**: {}", d.kind, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    let history_section = if history.is_empty() {
        String::new()
    } else {
        format!(
            "\n\n## Recent Conversation\n{}\n\nWhen the user refers to previous discussion, use the conversation above to understand what they mean.",
            format_routing_history(history, max_chars)
        )
    };

    format!(
        r#"You are a routing agent for the project "{title}".
Project purpose: {purpose}

Your job is to analyze the user's message and decide how to handle it.

## Available Sub-Agents
{agents}
{history_section}

## Routing Rules
- For simple greetings, conversational messages, or questions you can answer from the project context alone, respond directly.
- For tasks requiring code reading, analysis, search, or exploration: delegate to code-analyst.
- For tasks requiring code writing, editing, file creation, or modifications: delegate to implementer.
- For tasks requiring running tests or analyzing test output: delegate to test-runner.
- For tasks requiring web research, documentation lookup, or external information: delegate to researcher.
- For complex tasks needing multiple steps, delegate to multiple agents in sequence.
- When delegating, provide a clear, specific task description for each agent. Include any relevant context from the user's message.
- CRITICAL: If the user's message is a short reference (e.g. "do it", "go ahead", "execute"), expand the task description to include the FULL context from the recent conversation. The sub-agent will NOT see the conversation history. It only sees the task description you write.

## Response Format
You MUST respond with valid JSON in one of these formats:

**Direct response** (no agents needed):
```json
{{"directResponse": "Your response text here"}}
```

**Delegate to agents** (tools needed):
```json
{{
  "agents": [
    {{"agentType": "code-analyst", "taskDescription": "Detailed task for the agent..."}},
    {{"agentType": "implementer", "taskDescription": "Detailed task for the agent..."}}
  ],
  "synthesisHint": "Brief note on how to combine results for the user"
}}
```

Respond ONLY with JSON. No other text."#,
        title = project.title,
        purpose = project.purpose.as_deref().unwrap_or("General development"),
    )
}

impl Orchestrator {
    /// Ask the router what to do with `message`. Returns `None` when the
    /// turn was cancelled while waiting.
    pub(super) async fn route_message(
        &self,
        message: &str,
        routing_prompt: String,
        model_id: &str,
        turn: &CancellationToken,
    ) -> Option<RouteDecision> {
        let request = CompletionRequest::new(model_id)
            .with_system(routing_prompt)
            .with_user(message)
            .with_max_tokens(self.config.routing_max_tokens);

        let reply = tokio::select! {
            biased;
            _ = turn.cancelled() => return None,
            reply = self.completion.complete(request) => reply,
        };

        match reply {
            Ok(response) => {
                let decision = parse_route_response(&response.content, message);
                info!(
                    direct = matches!(decision, RouteDecision::Direct(_)),
                    "Routing decided"
                );
                Some(decision)
            }
            Err(e) => {
                error!(error = %e, "Routing call failed, delegating to code-analyst");
                Some(RouteDecision::fallback(message))
            }
        }
    }
}
