use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::config::Mode;
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ServerInfoTool;

#[async_trait]
impl McpTool for ServerInfoTool {
    fn name(&self) -> &'static str {
        "server_info"
    }

    fn description(&self) -> &'static str {
        "Report server version, operating mode, and effective limits."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        Ok(serde_json::json!({
            "name": "citus-mcp",
            "version": env!("CARGO_PKG_VERSION"),
            "mode": match ctx.config.mode {
                Mode::ReadOnly => "read_only",
                Mode::Admin => "admin",
            },
            "allow_execute": ctx.config.is_execute_allowed(),
            "max_rows": ctx.config.max_rows,
            "max_text_bytes": ctx.config.max_text_bytes,
            "caching_enabled": ctx.config.enable_caching,
            "fan_out_concurrency": ctx.config.fan_out_concurrency,
        }))
    }
}
