use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::snapshot_advisor::{self, SnapshotAdvisorInput};
use crate::types::ToolInputSchema;

pub struct SnapshotSourceAdvisorTool;

#[async_trait]
impl McpTool for SnapshotSourceAdvisorTool {
    fn name(&self) -> &'static str {
        "citus_snapshot_source_advisor"
    }

    fn description(&self) -> &'static str {
        "Recommends which worker to snapshot from when adding a node, ranked by predicted skew reduction."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "strategy": { "type": "string", "enum": ["by_shard_count", "by_disk_size", "hybrid"] },
                "exclude_nodes": { "type": "array", "items": { "type": "string" } },
                "require_reachable": { "type": "boolean" },
                "max_candidates": { "type": "integer" },
            }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: SnapshotAdvisorInput = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let output = snapshot_advisor::run(
            &ctx.workers,
            &ctx.config,
            &ctx.capabilities,
            Some(&ctx.cache),
            input,
        )
        .await?;
        serde_json::to_value(output).map_err(|e| ToolError::internal(e.to_string()))
    }
}
