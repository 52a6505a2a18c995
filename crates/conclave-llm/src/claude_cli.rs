//! Claude CLI session runner
//!
//! Runs `claude --print --output-format stream-json` as a child process and
//! translates its JSON lines into [`SessionEvent`]s.

use crate::error::{Error, Result};
use crate::session::{
    mcp_config_json, SessionEvent, SessionRequest, SessionRunner, SessionStream, TurnSummary,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

/// Claude CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeCliConfig {
    /// Command to execute
    #[serde(default = "default_command")]
    pub command: String,
    /// Extra arguments appended to every invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Permission mode passed to the CLI
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_permission_mode() -> String {
    "bypassPermissions".to_string()
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            extra_args: Vec::new(),
            env: HashMap::new(),
            permission_mode: default_permission_mode(),
        }
    }
}

/// Session runner backed by the `claude` CLI
pub struct ClaudeCliRunner {
    config: ClaudeCliConfig,
}

impl ClaudeCliRunner {
    /// Create a new runner
    #[must_use]
    pub fn new(config: ClaudeCliConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, request: &SessionRequest) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--include-partial-messages")
            .arg("--permission-mode")
            .arg(&self.config.permission_mode)
            .arg("--max-turns")
            .arg(request.max_turns.to_string());

        if !request.model.is_empty() {
            cmd.arg("--model").arg(&request.model);
        }
        if !request.system_prompt.is_empty() {
            cmd.arg("--system-prompt").arg(&request.system_prompt);
        }
        if !request.allowed_tools.is_empty() {
            cmd.arg("--allowedTools").arg(request.allowed_tools.join(","));
        }
        if let Some(session_id) = &request.resume {
            cmd.arg("--resume").arg(session_id);
        }
        if !request.mcp_servers.is_empty() {
            cmd.arg("--mcp-config")
                .arg(mcp_config_json(&request.mcp_servers).to_string());
        }
        cmd.args(&self.config.extra_args);
        cmd.arg(&request.prompt);

        for (key, value) in &self.config.env {
            // Expand ${VAR} references
            let expanded = if value.starts_with("${") && value.ends_with('}') {
                let var_name = &value[2..value.len() - 1];
                std::env::var(var_name).unwrap_or_default()
            } else {
                value.clone()
            };
            cmd.env(key, expanded);
        }

        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for ClaudeCliRunner {
    fn default() -> Self {
        Self::new(ClaudeCliConfig::default())
    }
}

struct CliStream {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    pending: VecDeque<SessionEvent>,
    saw_result: bool,
    done: bool,
}

#[async_trait]
impl SessionRunner for ClaudeCliRunner {
    async fn start(&self, request: SessionRequest) -> Result<SessionStream> {
        debug!(
            command = %self.config.command,
            model = %request.model,
            resume = request.resume.is_some(),
            "Starting claude session"
        );

        let mut child = self
            .build_command(&request)
            .spawn()
            .map_err(|e| Error::Session(format!("failed to spawn {}: {e}", self.config.command)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Session("child stdout unavailable".to_string()))?;

        let state = CliStream {
            lines: BufReader::new(stdout).lines(),
            child,
            pending: VecDeque::new(),
            saw_result: false,
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(event) = st.pending.pop_front() {
                    return Some((Ok(event), st));
                }
                if st.done {
                    return None;
                }
                match st.lines.next_line().await {
                    Ok(Some(line)) => {
                        let events = parse_stream_line(&line);
                        if events
                            .iter()
                            .any(|e| matches!(e, SessionEvent::TurnComplete(_)))
                        {
                            st.saw_result = true;
                        }
                        st.pending.extend(events);
                    }
                    Ok(None) => {
                        st.done = true;
                        match st.child.wait().await {
                            Ok(status) if !status.success() && !st.saw_result => {
                                return Some((
                                    Err(Error::Session(format!("claude exited with {status}"))),
                                    st,
                                ));
                            }
                            Err(e) => {
                                return Some((Err(Error::Session(e.to_string())), st));
                            }
                            _ => {}
                        }
                    }
                    Err(e) => {
                        st.done = true;
                        return Some((Err(Error::Session(e.to_string())), st));
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Translate one stream-json line into zero or more session events.
///
/// Unknown or malformed lines yield nothing.
pub fn parse_stream_line(line: &str) -> Vec<SessionEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Ignoring non-JSON line from claude");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    match value.get("type").and_then(Value::as_str) {
        Some("system") => {
            if let Some(id) = value.get("session_id").and_then(Value::as_str) {
                events.push(SessionEvent::SessionStarted {
                    session_id: id.to_string(),
                });
            }
        }
        Some("stream_event") => {
            let event = &value["event"];
            if event["type"] == "content_block_delta" && event["delta"]["type"] == "text_delta" {
                if let Some(text) = event["delta"]["text"].as_str() {
                    events.push(SessionEvent::TextDelta {
                        text: text.to_string(),
                    });
                }
            }
        }
        Some("assistant") => {
            let mut text = String::new();
            for block in content_blocks(&value) {
                match block["type"].as_str() {
                    Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                    Some("tool_use") => events.push(SessionEvent::ToolUse {
                        tool_use_id: block["id"].as_str().unwrap_or_default().to_string(),
                        tool_name: block["name"].as_str().unwrap_or_default().to_string(),
                        input: block["input"].clone(),
                    }),
                    _ => {}
                }
            }
            if !text.is_empty() {
                events.insert(0, SessionEvent::AssistantText { text });
            }
        }
        Some("user") => {
            for block in content_blocks(&value) {
                if block["type"] == "tool_result" {
                    events.push(SessionEvent::ToolResult {
                        tool_use_id: block["tool_use_id"].as_str().unwrap_or_default().to_string(),
                        output: block["content"].clone(),
                        is_error: block["is_error"].as_bool().unwrap_or(false),
                    });
                }
            }
        }
        Some("result") => {
            if let Some(id) = value.get("session_id").and_then(Value::as_str) {
                events.push(SessionEvent::SessionStarted {
                    session_id: id.to_string(),
                });
            }
            let usage = &value["usage"];
            events.push(SessionEvent::TurnComplete(TurnSummary {
                success: value["subtype"] == "success" && !value["is_error"].as_bool().unwrap_or(false),
                result: value["result"].as_str().map(str::to_string),
                cost_usd: value["total_cost_usd"].as_f64().unwrap_or(0.0),
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
            }));
        }
        _ => {}
    }
    events
}

fn content_blocks(value: &Value) -> impl Iterator<Item = &Value> {
    value["message"]["content"]
        .as_array()
        .map(|blocks| blocks.iter())
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::McpServer;

    #[test]
    fn test_parse_system_init() {
        let events = parse_stream_line(r#"{"type":"system","subtype":"init","session_id":"abc"}"#);
        assert_eq!(
            events,
            vec![SessionEvent::SessionStarted {
                session_id: "abc".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_text_delta() {
        let line = r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}}"#;
        assert_eq!(
            parse_stream_line(line),
            vec![SessionEvent::TextDelta {
                text: "Hel".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_assistant_with_tool_use() {
        let line = r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"Reading"},
            {"type":"tool_use","id":"tu_1","name":"Read","input":{"file_path":"a.rs"}}
        ]}}"#;
        let events = parse_stream_line(line);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], SessionEvent::AssistantText { text } if text == "Reading"));
        assert!(
            matches!(&events[1], SessionEvent::ToolUse { tool_use_id, tool_name, .. } if tool_use_id == "tu_1" && tool_name == "Read")
        );
    }

    #[test]
    fn test_parse_tool_result() {
        let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_1","content":"fn main() {}","is_error":false}]}}"#;
        let events = parse_stream_line(line);
        assert!(
            matches!(&events[0], SessionEvent::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "tu_1")
        );
    }

    #[test]
    fn test_parse_result_success() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","session_id":"s1","total_cost_usd":0.02,"usage":{"input_tokens":100,"output_tokens":20}}"#;
        let events = parse_stream_line(line);
        assert_eq!(events.len(), 2);
        match &events[1] {
            SessionEvent::TurnComplete(summary) => {
                assert!(summary.success);
                assert_eq!(summary.result.as_deref(), Some("done"));
                assert_eq!(summary.input_tokens, 100);
                assert_eq!(summary.output_tokens, 20);
                assert!((summary.cost_usd - 0.02).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_result_error_subtype() {
        let line = r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#;
        let events = parse_stream_line(line);
        assert!(matches!(&events[0], SessionEvent::TurnComplete(s) if !s.success));
    }

    #[test]
    fn test_parse_garbage_is_ignored() {
        assert!(parse_stream_line("not json").is_empty());
        assert!(parse_stream_line("").is_empty());
        assert!(parse_stream_line(r#"{"type":"unknown"}"#).is_empty());
    }

    #[test]
    fn test_build_command_includes_resume() {
        let runner = ClaudeCliRunner::default();
        let request = SessionRequest::new("do it")
            .with_model("claude-sonnet-4-5-20250929")
            .with_allowed_tools(vec!["Read".to_string(), "Grep".to_string()])
            .with_resume(Some("sess-1".to_string()));
        let cmd = runner.build_command(&request);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w[0] == "--resume" && w[1] == "sess-1"));
        assert!(args.windows(2).any(|w| w[0] == "--allowedTools" && w[1] == "Read,Grep"));
        assert_eq!(args.last().map(String::as_str), Some("do it"));
    }

    #[test]
    fn test_build_command_passes_mcp_servers() {
        let runner = ClaudeCliRunner::default();
        let request = SessionRequest::new("set up").with_mcp_server(McpServer::new(
            "project-settings",
            "/usr/local/bin/conclave",
            vec!["mcp".to_string(), "--project".to_string(), "p1".to_string()],
        ));
        let cmd = runner.build_command(&request);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let position = args.iter().position(|a| a == "--mcp-config").unwrap();
        let config: Value = serde_json::from_str(&args[position + 1]).unwrap();
        let server = &config["mcpServers"]["project-settings"];
        assert_eq!(server["type"], "stdio");
        assert_eq!(server["command"], "/usr/local/bin/conclave");
        assert_eq!(server["args"][2], "p1");

        let plain = runner.build_command(&SessionRequest::new("hi"));
        assert!(!plain.as_std().get_args().any(|a| a == "--mcp-config"));
    }

    fn runner_for(command: &str) -> ClaudeCliRunner {
        ClaudeCliRunner::new(ClaudeCliConfig {
            command: command.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_missing_binary_fails_to_start() {
        let runner = runner_for("conclave-no-such-binary");
        let result = tokio_test::block_on(runner.start(SessionRequest::new("hi")));
        assert!(matches!(result, Err(Error::Session(msg)) if msg.contains("failed to spawn")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_json_output_ends_quietly() {
        let events: Vec<_> = tokio_test::block_on(async {
            let stream = runner_for("echo").start(SessionRequest::new("hi")).await.unwrap();
            stream.collect().await
        });
        assert!(events.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_without_result_is_an_error() {
        let events: Vec<_> = tokio_test::block_on(async {
            let stream = runner_for("false").start(SessionRequest::new("hi")).await.unwrap();
            stream.collect().await
        });
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Err(Error::Session(msg)) if msg.contains("exited")));
    }
}
