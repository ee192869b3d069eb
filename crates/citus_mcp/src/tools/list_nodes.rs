use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ListNodesTool;

#[async_trait]
impl McpTool for ListNodesTool {
    fn name(&self) -> &'static str {
        "list_nodes"
    }

    fn description(&self) -> &'static str {
        "List coordinator and worker nodes from the current topology."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let nodes = ctx.workers.topology().await?;
        let (nodes, truncated) = ctx.output_budget.enforce_rows(nodes);
        Ok(serde_json::json!({ "nodes": nodes, "truncated": truncated }))
    }
}
