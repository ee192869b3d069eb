use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ValidateRebalancePrereqsTool;

#[async_trait]
impl McpTool for ValidateRebalancePrereqsTool {
    fn name(&self) -> &'static str {
        "citus_validate_rebalance_prereqs"
    }

    fn description(&self) -> &'static str {
        "Checks whether a rebalance can safely be planned: no running background job, all shard-bearing nodes reachable."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let mut blockers = Vec::new();

        let has_job_catalog: bool =
            sqlx::query_scalar("SELECT to_regclass('pg_dist_background_job') IS NOT NULL")
                .fetch_one(ctx.workers.coordinator())
                .await
                .map_err(citus_db::DbError::from)?;
        if has_job_catalog {
            let running: i64 = sqlx::query_scalar(
                "SELECT count(*) FROM pg_dist_background_job WHERE state IN ('running', 'scheduled')",
            )
            .fetch_one(ctx.workers.coordinator())
            .await
            .map_err(citus_db::DbError::from)?;
            if running > 0 {
                blockers.push(format!("{running} background job(s) already running or scheduled"));
            }
        }

        let nodes = ctx.workers.topology().await?;
        for node in nodes.iter().filter(|n| !n.is_coordinator && n.should_have_shards) {
            if !node.is_active {
                blockers.push(format!("node {} ({}:{}) is inactive", node.node_id, node.host, node.port));
                continue;
            }
            let reachable = ctx
                .workers
                .probe_reachable(node.node_id, std::time::Duration::from_secs(2))
                .await;
            if !reachable {
                blockers.push(format!(
                    "node {} ({}:{}) is not reachable",
                    node.node_id, node.host, node.port
                ));
            }
        }

        Ok(serde_json::json!({
            "ready": blockers.is_empty(),
            "blockers": blockers,
        }))
    }
}
