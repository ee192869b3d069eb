//! JSON-RPC 2.0 server over stdio for the Model Context Protocol (spec.md
//! §4.9, SPEC_FULL.md §3.4).
//!
//! # Architecture
//!
//! ```text
//! stdin (one JSON-RPC message per line) -> handle_request -> ToolRegistry
//!                                                                |
//! stdout (one JSON-RPC message per line) <- write_response <-----+
//! ```
//!
//! The loop is async (tokio stdin/stdout) rather than the teacher's blocking
//! thread, since every tool body here is itself async (`sqlx`, fan-out).

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::protocol::{
    methods, ContentBlock, ErrorCode, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo, ToolCallParams,
    ToolCallResult, ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::security::AuditLog;
use crate::tools::{ToolCall, ToolContext, ToolRegistry};

/// Server identity plus the optional audit trail (SPEC_FULL.md §4.11). All
/// other dependencies (pools, guardrails, cache, ...) live in [`ToolContext`]
/// and are built once by `citus_mcp_cli` before the server starts.
#[derive(Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub audit_log_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "citus-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            audit_log_path: None,
        }
    }
}

pub struct Server {
    config: ServerConfig,
    tools: ToolRegistry,
    ctx: ToolContext,
    audit: Option<AuditLog>,
    initialized: bool,
}

impl Server {
    pub fn new(config: ServerConfig, ctx: ToolContext) -> Result<Self> {
        let audit = config
            .audit_log_path
            .as_ref()
            .map(AuditLog::new)
            .transpose()
            .map_err(|e| anyhow::anyhow!("failed to open audit log: {e}"))?;

        Ok(Self {
            config,
            tools: ToolRegistry::new(),
            ctx,
            audit,
            initialized: false,
        })
    }

    /// Run the server: read one JSON-RPC message per line from stdin, write
    /// one response per line to stdout. Returns once stdin is closed.
    pub async fn run(&mut self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        info!(name = %self.config.server_name, version = %self.config.server_version, "MCP server starting");

        while let Some(line) = lines.next_line().await.context("reading from stdin")? {
            if line.trim().is_empty() {
                continue;
            }
            debug!(%line, "received");

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::new(ErrorCode::ParseError, format!("invalid JSON: {e}")),
                    );
                    self.write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            let response = self.handle_request(request).await;

            // Notifications (no id, no result, no error) get no reply.
            if response.id.is_none() && response.result.is_none() && response.error.is_none() {
                continue;
            }

            self.write_response(&mut stdout, &response).await?;
        }

        info!("MCP server shutting down");
        Ok(())
    }

    async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(
                    ErrorCode::InvalidRequest,
                    format!("invalid JSON-RPC version: {}", request.jsonrpc),
                ),
            );
        }

        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request),
            methods::INITIALIZED => {
                if request.id.is_none() {
                    return JsonRpcResponse {
                        jsonrpc: JSONRPC_VERSION.to_string(),
                        id: None,
                        result: None,
                        error: None,
                    };
                }
                JsonRpcResponse::success(request.id, Value::Null)
            }
            methods::TOOLS_LIST => self.handle_tools_list(request),
            methods::TOOLS_CALL => self.handle_tools_call(request).await,
            methods::PING => JsonRpcResponse::success(request.id, Value::Object(Default::default())),
            other => JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::MethodNotFound, format!("unknown method: {other}")),
            ),
        }
    }

    fn handle_initialize(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = match request.params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, format!("invalid initialize params: {e}")),
                )
            }
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, "missing initialize params"),
                )
            }
        };

        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol = %params.protocol_version,
            "client initialized"
        );

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
                resources: None,
                prompts: None,
                logging: None,
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        };

        JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
    }

    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.tools.list_tools(),
        };
        JsonRpcResponse::success(request.id, serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        if !self.initialized {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ErrorCode::ServerError(-32002), "server not initialized"),
            );
        }

        let params: ToolCallParams = match request.params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, format!("invalid tool call params: {e}")),
                )
            }
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InvalidParams, "missing tool call params"),
                )
            }
        };

        info!(tool = %params.name, "dispatching tool call");
        let started = Instant::now();

        let approval_token = extract_approval_token(&params.arguments);
        let arguments_for_audit = params.arguments.clone();
        let call = ToolCall {
            arguments: params.arguments,
            approval_token,
        };

        let result = self.tools.call_tool(&params.name, call, &self.ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Some(audit) = &self.audit {
            let error_code = result.as_ref().err().map(|e| e.code.as_str());
            audit.log_tool_call(&params.name, &arguments_for_audit, duration_ms, error_code);
        }

        let tool_result = match result {
            Ok(value) => ToolCallResult {
                content: vec![ContentBlock::text(
                    serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()),
                )],
                is_error: false,
                structured_content: Some(value),
            },
            Err(err) => {
                warn!(tool = %params.name, error = %err, "tool call failed");
                let payload = serde_json::to_value(&err).unwrap_or(Value::Null);
                ToolCallResult {
                    content: vec![ContentBlock::text(err.to_string())],
                    is_error: true,
                    structured_content: Some(payload),
                }
            }
        };

        match serde_json::to_value(tool_result) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!(error = %e, "failed to serialize tool call result");
                JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::new(ErrorCode::InternalError, "failed to serialize tool result"),
                )
            }
        }
    }

    async fn write_response<W: tokio::io::AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<()> {
        let json = serde_json::to_string(response)?;
        debug!(%json, "sending");
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Approval tokens ride inside `arguments.approval_token` alongside the
/// tool's own fields; tool `Input` structs don't declare it, so serde's
/// default (ignore unknown fields) leaves it harmless there.
fn extract_approval_token(arguments: &Value) -> Option<String> {
    arguments.get("approval_token")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_uses_crate_version() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "citus-mcp");
        assert!(config.audit_log_path.is_none());
    }

    #[test]
    fn extracts_approval_token_when_present() {
        let args = serde_json::json!({"shard_id": 1, "approval_token": "abc.def"});
        assert_eq!(extract_approval_token(&args), Some("abc.def".to_string()));
    }

    #[test]
    fn missing_approval_token_is_none() {
        let args = serde_json::json!({"shard_id": 1});
        assert_eq!(extract_approval_token(&args), None);
    }
}
