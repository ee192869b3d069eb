use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize)]
struct Input {
    host: String,
    port: i32,
}

pub struct NodePrepareAdvisorTool;

#[async_trait]
impl McpTool for NodePrepareAdvisorTool {
    fn name(&self) -> &'static str {
        "citus_node_prepare_advisor"
    }

    fn description(&self) -> &'static str {
        "Checklist for adding a new worker node: whether it's already registered and what to run next."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "host": { "type": "string" },
                "port": { "type": "integer" },
            }),
            vec!["host".to_string(), "port".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let nodes = ctx.workers.topology().await?;
        let already_registered = nodes
            .iter()
            .any(|n| n.host == input.host && n.port == input.port);

        let mut steps = Vec::new();
        if already_registered {
            steps.push("node is already registered in pg_dist_node; no action needed".to_string());
        } else {
            steps.push(format!(
                "run SELECT citus_add_node('{}', {}) on the coordinator",
                input.host, input.port
            ));
            steps.push("run citus_snapshot_source_advisor to pick a source worker to snapshot from".to_string());
            steps.push("run citus_rebalance_plan once the node is reachable".to_string());
        }

        Ok(serde_json::json!({
            "already_registered": already_registered,
            "steps": steps,
        }))
    }
}
