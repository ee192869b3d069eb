use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ShardHeatmapTool;

#[async_trait]
impl McpTool for ShardHeatmapTool {
    fn name(&self) -> &'static str {
        "citus_shard_heatmap"
    }

    fn description(&self) -> &'static str {
        "Per-node shard counts and table breakdown, to spot hot workers at a glance."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let rows = sqlx::query(
            "SELECT pn.nodeid AS node_id, pn.nodename AS host, pn.nodeport AS port, \
                    s.logicalrelid::regclass::text AS table_name, count(*) AS shard_count \
             FROM pg_dist_node pn \
             JOIN pg_dist_placement pp ON pp.groupid = pn.groupid \
             JOIN pg_dist_shard s ON s.shardid = pp.shardid \
             WHERE pn.isactive AND pn.shouldhaveshards \
             GROUP BY pn.nodeid, pn.nodename, pn.nodeport, s.logicalrelid \
             ORDER BY pn.nodeid, shard_count DESC",
        )
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let mut by_node: std::collections::BTreeMap<i32, (String, i32, Vec<Value>, i64)> =
            std::collections::BTreeMap::new();
        for row in rows {
            let node_id: i32 = row.get("node_id");
            let host: String = row.get("host");
            let port: i32 = row.get("port");
            let table_name: String = row.get("table_name");
            let shard_count: i64 = row.get("shard_count");

            let entry = by_node
                .entry(node_id)
                .or_insert_with(|| (host, port, Vec::new(), 0));
            entry.2.push(serde_json::json!({
                "table_name": table_name,
                "shard_count": shard_count,
            }));
            entry.3 += shard_count;
        }

        let nodes: Vec<Value> = by_node
            .into_iter()
            .map(|(node_id, (host, port, tables, total))| {
                serde_json::json!({
                    "node_id": node_id,
                    "host": host,
                    "port": port,
                    "total_shards": total,
                    "tables": tables,
                })
            })
            .collect();

        let (nodes, truncated) = ctx.output_budget.enforce_rows(nodes);
        Ok(serde_json::json!({ "nodes": nodes, "truncated": truncated }))
    }
}
