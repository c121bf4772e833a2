//! MCP server over line-delimited JSON-RPC on stdio.

pub mod protocol;
pub mod tools;

use std::io;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::gateway::{ExecutionRequest, ExecutionResult, Gateway};
use crate::policy::TrustTier;
use protocol::{
    DEFAULT_PROTOCOL_VERSION, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, PARSE_ERROR, Request, Response, RpcError, ToolCallParams, ToolResult,
};

/// Request dispatcher. Shared across invocation tasks behind an `Arc`.
pub struct Server {
    gateway: Gateway,
    tiers: Vec<TrustTier>,
}

impl Server {
    pub fn new(gateway: Gateway, manual_tier: bool) -> Self {
        let mut tiers = vec![TrustTier::Auto];
        if manual_tier {
            tiers.push(TrustTier::Manual);
        }
        Self { gateway, tiers }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Gateway::from_config(config), config.settings.manual_tier)
    }

    /// Resolve a tool name to its tier, if that tier is exposed.
    fn tier_for(&self, tool: &str) -> Option<TrustTier> {
        TrustTier::from_tool_name(tool).filter(|t| self.tiers.contains(t))
    }

    /// Handle one line from the transport. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("unparseable message: {e}");
                return Some(Response::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: Request = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(Response::failure(
                    id.unwrap_or(Value::Null),
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(Response::failure(
                request.id.unwrap_or(Value::Null),
                RpcError::new(
                    INVALID_REQUEST,
                    format!("Invalid request: jsonrpc must be \"{JSONRPC_VERSION}\""),
                ),
            ));
        }

        let Some(id) = request.id.clone() else {
            debug!("notification: {}", request.method);
            return None;
        };

        Some(match self.dispatch(request).await {
            Ok(result) => Response::success(id, result),
            Err(err) => Response::failure(id, err),
        })
    }

    async fn dispatch(&self, request: Request) -> Result<Value, RpcError> {
        match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools: Vec<_> = self.tiers.iter().map(|t| tools::definition(*t)).collect();
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(request.params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": tools::SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "instructions": tools::INSTRUCTIONS,
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {e}")))?;

        let tier = self
            .tier_for(&params.name)
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name)))?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let result = match serde_json::from_value::<ExecutionRequest>(arguments) {
            Ok(request) => self.gateway.invoke(tier, &request).await,
            Err(e) => ExecutionResult::error(format!("Invalid arguments: {e}")),
        };

        serde_json::to_value(ToolResult::from(result))
            .map_err(RpcError::internal)
    }
}

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// Each request runs on its own task so a long build does not hold up a
/// `ping`. A single writer task owns `writer`, which keeps frames whole.
/// Returns once every in-flight response has been written.
pub async fn serve<R, W>(server: Arc<Server>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut frame = serde_json::to_vec(&response)?;
            frame.push(b'\n');
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut reader = reader;
    let mut frame = Vec::new();
    let read_result = loop {
        frame.clear();
        match reader.read_until(b'\n', &mut frame).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        let line = match String::from_utf8(std::mem::take(&mut frame)) {
            Ok(line) => line,
            Err(e) => {
                warn!("non-UTF-8 frame: {e}");
                let _ = tx.send(Response::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_line(&line).await {
                let _ = tx.send(response);
            }
        });
    };

    if let Err(ref e) = read_result {
        error!("reading input failed: {e}");
    }
    info!("input closed, draining in-flight requests");
    drop(tx);
    let write_result = match writer_task.await {
        Ok(result) => result,
        Err(e) => {
            error!("writer task failed: {e}");
            Err(io::Error::other(e))
        }
    };
    read_result.and(write_result)
}
