//! Line-delimited JSON-RPC loop: one request per line in, one response per line out.
//!
//! Logging goes through `log` (stderr in the binary); stdout carries protocol frames only.

use crate::mcp::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerInfo, JSONRPC_VERSION,
};
use crate::tools::{Dispatcher, Invocation};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub const SERVER_NAME: &str = "periskope-mcp";
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Exposes the tool catalog over MCP.
pub struct McpServer {
    dispatcher: Dispatcher,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Serve until `reader` hits EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("reading request line")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line).await {
                let mut frame = serde_json::to_string(&response).context("encoding response")?;
                frame.push('\n');
                writer
                    .write_all(frame.as_bytes())
                    .await
                    .context("writing response")?;
                writer.flush().await.context("flushing response")?;
            }
        }
        log::info!("mcp: input closed, shutting down");
        Ok(())
    }

    /// Handle one raw line. None for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("mcp: unparseable request: {}", e);
                return Some(JsonRpcResponse::err(
                    Value::Null,
                    JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::err(
                request.id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    json!({ "expected": JSONRPC_VERSION, "got": request.jsonrpc }),
                ),
            ));
        }
        self.handle_request(request).await
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        log::debug!("mcp: {} (id {})", request.method, request.id);
        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "initialized" | "notifications/initialized" | "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.registry().tool_infos() })),
            "tools/call" => self.call_tool(&request.params).await,
            other => Err(JsonRpcError::new(
                JsonRpcError::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        if request.is_notification() {
            if let Err(e) = result {
                log::warn!("mcp: notification {} failed: {}", request.method, e.message);
            }
            return None;
        }
        Some(match result {
            Ok(value) => JsonRpcResponse::ok(request.id, value),
            Err(e) => JsonRpcResponse::err(request.id, e),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
            .to_string();
        let result = InitializeResult {
            protocol_version,
            capabilities: json!({ "tools": {} }),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    /// Tool failures come back as envelopes with `isError`; only a malformed call is a protocol error.
    async fn call_tool(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let invocation: Invocation = serde_json::from_value(params.clone()).map_err(|e| {
            JsonRpcError::new(
                JsonRpcError::INVALID_PARAMS,
                format!("tools/call requires a tool name: {}", e),
            )
        })?;
        let envelope = self.dispatcher.dispatch(&invocation).await;
        serde_json::to_value(envelope)
            .map_err(|e| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, e.to_string()))
    }
}

/// Run over process stdin/stdout.
pub async fn run_stdio(dispatcher: Dispatcher) -> Result<()> {
    log::info!("mcp: serving {} tools on stdio", dispatcher.registry().describe().len());
    let server = McpServer::new(dispatcher);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Endpoints, MessagingGateway};
    use crate::upstream::testing::ScriptedApi;
    use std::sync::Arc;

    fn server(api: &Arc<ScriptedApi>) -> McpServer {
        let gateway = MessagingGateway::new(
            api.clone(),
            api.clone(),
            Endpoints {
                canonical: "https://canonical.test".to_string(),
                alternatives: Vec::new(),
            },
        );
        McpServer::new(Dispatcher::new(Arc::new(gateway)))
    }

    async fn run(server: &McpServer, input: &str) -> Vec<Value> {
        let mut out = Vec::new();
        server.serve(input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initialize_then_list_tools() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let out = run(&server(&api), input).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(out[0]["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(out[0]["result"]["capabilities"], json!({"tools": {}}));
        let tools = out[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 8);
        assert_eq!(tools[0]["name"], "send_whatsapp_message");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tool_failure_is_an_envelope_not_a_protocol_error() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let input = r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"delete_everything","arguments":{}}}"#;
        let out = run(&server(&api), input).await;
        assert!(out[0].get("error").is_none());
        assert_eq!(out[0]["id"], "a");
        assert_eq!(out[0]["result"]["isError"], true);
        assert_eq!(out[0]["result"]["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn tools_call_reaches_dispatcher() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"ok": true})));
        let input = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"send_whatsapp_message","arguments":{"chat_id":"919537851844","message":"hello"}}}"#;
        let out = run(&server(&api), input).await;
        assert_eq!(out[0]["result"]["isError"], false);
        assert_eq!(api.calls()[0].param_str("chat_id"), Some("919537851844@c.us"));
    }

    #[tokio::test]
    async fn protocol_errors() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let s = server(&api);
        let parse = s.handle_line("{not json").await.unwrap();
        assert_eq!(parse.error.unwrap().code, JsonRpcError::PARSE_ERROR);
        let version = s.handle_line(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).await.unwrap();
        assert_eq!(version.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
        let unknown = s.handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#).await.unwrap();
        assert_eq!(unknown.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
        let missing = s.handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call"}"#).await.unwrap();
        assert_eq!(missing.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
        assert!(s.handle_line(r#"{"jsonrpc":"2.0","method":"ping"}"#).await.is_none());
        assert!(api.attempts().is_empty());
    }
}
