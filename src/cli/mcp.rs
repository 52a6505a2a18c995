//! Project settings tools over MCP (JSON-RPC 2.0 on stdio)
//!
//! Setup sessions launch `conclave mcp --project <id>` as a tool server.
//! Logs go to stderr so stdout carries protocol lines only.
//!
//! Supported methods:
//! - `initialize`: server capabilities
//! - `tools/list`: the settings tool definitions
//! - `tools/call`: run a tool against the bound project
//! - `ping`: liveness

use crate::app::App;
use anyhow::Result;
use conclave_core::settings::{settings_tool_definitions, SETTINGS_SERVER_NAME};
use conclave_core::SettingsTools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC request or notification
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serve the settings tools of `project` until stdin closes.
pub async fn run(project: &str, app: &App) -> Result<()> {
    let tools = SettingsTools::new(app.settings.clone(), project);
    info!(project_id = %project, "Settings tool server started");
    serve(&tools, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("Settings tool server stopped");
    Ok(())
}

async fn serve<R, W>(tools: &SettingsTools, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => {
                debug!(method = %request.method, "MCP request");
                handle_request(tools, request).await
            }
            Err(e) => Some(JsonRpcResponse::err(Value::Null, -32700, format!("Parse error: {e}"))),
        };

        // Notifications get no reply
        if let Some(response) = response {
            let json = serde_json::to_string(&response)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

async fn handle_request(tools: &SettingsTools, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let id = request.id?;
    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": SETTINGS_SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        ),
        "ping" => JsonRpcResponse::ok(id, json!({})),
        "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": settings_tool_definitions() })),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(Value::as_str) else {
                return Some(JsonRpcResponse::err(id, -32602, "Missing 'name' parameter"));
            };
            let arguments = request.params.get("arguments").cloned().unwrap_or(Value::Null);
            let reply = tools.call(name, arguments).await;
            JsonRpcResponse::ok(
                id,
                json!({
                    "content": [{ "type": "text", "text": reply.text }],
                    "isError": reply.is_error,
                }),
            )
        }
        other => JsonRpcResponse::err(id, -32601, format!("Method not found: {other}")),
    };
    Some(response)
}
