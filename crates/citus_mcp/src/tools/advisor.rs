use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct AdvisorTool;

#[async_trait]
impl McpTool for AdvisorTool {
    fn name(&self) -> &'static str {
        "citus_advisor"
    }

    fn description(&self) -> &'static str {
        "Cluster-wide recommendations: unbalanced workers, unreachable nodes, and which other tool to run next."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let nodes = ctx.workers.topology().await?;
        let mut findings = Vec::new();

        let inactive: Vec<&str> = nodes
            .iter()
            .filter(|n| !n.is_active)
            .map(|n| n.host.as_str())
            .collect();
        if !inactive.is_empty() {
            findings.push(serde_json::json!({
                "severity": "warning",
                "summary": format!("{} node(s) marked inactive in pg_dist_node", inactive.len()),
                "nodes": inactive,
                "next_tool": "list_nodes",
            }));
        }

        let row = sqlx::query(
            "SELECT pn.nodeid AS node_id, count(ps.shardid) AS shard_count \
             FROM pg_dist_node pn \
             LEFT JOIN pg_dist_placement pp ON pp.groupid = pn.groupid \
             LEFT JOIN pg_dist_shard ps ON ps.shardid = pp.shardid \
             WHERE pn.isactive AND pn.shouldhaveshards \
             GROUP BY pn.nodeid",
        )
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let counts: Vec<i64> = row.iter().map(|r| r.get::<i64, _>("shard_count")).collect();
        if let (Some(&max), Some(&min)) = (counts.iter().max(), counts.iter().filter(|c| **c > 0).min()) {
            if min > 0 && max as f64 / min as f64 > 1.5 {
                findings.push(serde_json::json!({
                    "severity": "info",
                    "summary": "shard counts are unevenly distributed across workers",
                    "next_tool": "citus_shard_skew_report",
                }));
            }
        }

        Ok(serde_json::json!({
            "findings": findings,
            "node_count": nodes.len(),
        }))
    }
}
