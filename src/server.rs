//! Line-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! Each request is handled on its own task so a long generator run does not
//! block `ping` or `tools/list`. Responses are written as they complete, one
//! JSON object per line. Nothing else may be written to stdout.

use crate::tools::{self, ToolError, ToolRouter};
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Validation(e) => Self {
                code: INVALID_PARAMS,
                message: e.to_string(),
                data: Some(json!({ "field": e.field, "constraint": e.constraint })),
            },
            ToolError::UnknownTool(name) => {
                Self::new(INVALID_PARAMS, format!("Unknown tool: {}", name))
            }
            ToolError::Unexpected(e) => {
                error!("Tool failed: {:#}", e);
                Self::new(INTERNAL_ERROR, format!("{:#}", e))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }
}

pub struct Server {
    router: ToolRouter,
}

impl Server {
    pub fn new(router: ToolRouter) -> Self {
        Self { router }
    }

    /// Handles one incoming line. `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unparsable message: {}", e);
                let error = RpcError::new(PARSE_ERROR, format!("Parse error: {}", e));
                return Some(Response::new(Value::Null, Err(error)));
            }
        };

        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Some(Response::new(
                id.unwrap_or(Value::Null),
                Err(RpcError::new(INVALID_REQUEST, "Invalid request: missing method")),
            ));
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let Some(id) = id else {
            debug!("Notification: {}", method);
            return None;
        };

        debug!("Request {}: {}", id, method);
        Some(Response::new(id, self.dispatch(method, &params).await))
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => {
                let version = params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(PROTOCOL_VERSION);
                Ok(json!({
                    "protocolVersion": version,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }))
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).ok_or_else(|| {
                    RpcError::new(INVALID_PARAMS, "Invalid parameter 'name': is required")
                })?;
                let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                let output = self.router.call(name, &arguments).await?;
                Ok(output.to_call_result())
            }
            other => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        }
    }

    /// Serves until `reader` reaches EOF and every in-flight request has
    /// been answered.
    ///
    /// A line that is not valid UTF-8 is answered with a parse error and
    /// the loop carries on with the next line.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
        let mut tx = Some(tx);
        let mut buf = Vec::new();

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf), if tx.is_some() => {
                    if read? == 0 {
                        info!("stdin closed, waiting for in-flight requests");
                        tx = None;
                        continue;
                    }
                    let raw = std::mem::take(&mut buf);
                    let Some(sender) = &tx else { continue };
                    match String::from_utf8(raw) {
                        Ok(line) if line.trim().is_empty() => {}
                        Ok(line) => self.spawn_request(line, sender.clone()),
                        Err(e) => {
                            warn!("Line is not valid UTF-8: {}", e);
                            let error = RpcError::new(
                                PARSE_ERROR,
                                format!("Parse error: invalid UTF-8: {}", e),
                            );
                            let _ = sender.send(Response::new(Value::Null, Err(error)));
                        }
                    }
                }
                Some(response) = rx.recv() => {
                    let mut encoded = serde_json::to_string(&response)?;
                    encoded.push('\n');
                    writer.write_all(encoded.as_bytes()).await?;
                    writer.flush().await?;
                }
                else => break,
            }
        }
        Ok(())
    }

    fn spawn_request(self: &Arc<Self>, line: String, tx: mpsc::UnboundedSender<Response>) {
        let server = Arc::clone(self);
        let id = serde_json::from_str::<Value>(&line)
            .ok()
            .and_then(|v| v.get("id").cloned());

        tokio::spawn(async move {
            let handled = tokio::spawn(async move { server.handle_line(&line).await }).await;
            let response = match handled {
                Ok(response) => response,
                Err(e) => {
                    error!("Request handler failed: {}", e);
                    id.map(|id| {
                        let error = RpcError::new(INTERNAL_ERROR, format!("Internal error: {}", e));
                        Response::new(id, Err(error))
                    })
                }
            };
            if let Some(response) = response {
                if tx.send(response).is_err() {
                    warn!("Response dropped, output closed");
                }
            }
        });
    }
}
