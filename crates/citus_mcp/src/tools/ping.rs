use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct PingTool;

#[async_trait]
impl McpTool for PingTool {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn description(&self) -> &'static str {
        "Liveness check; does not touch the database."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, _ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        Ok(serde_json::json!({ "ok": true }))
    }
}
