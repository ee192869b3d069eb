use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ClusterSummaryTool;

#[async_trait]
impl McpTool for ClusterSummaryTool {
    fn name(&self) -> &'static str {
        "citus_cluster_summary"
    }

    fn description(&self) -> &'static str {
        "High-level cluster health: node counts, table counts, shard totals."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let nodes = ctx.workers.topology().await?;
        let worker_count = nodes.iter().filter(|n| !n.is_coordinator).count();
        let active_count = nodes.iter().filter(|n| n.is_active).count();

        let row = sqlx::query(
            "SELECT count(*) FILTER (WHERE partkey IS NOT NULL) AS distributed_tables, \
                    count(*) FILTER (WHERE partkey IS NULL) AS reference_tables, \
                    (SELECT count(*) FROM pg_dist_shard) AS total_shards \
             FROM pg_dist_partition",
        )
        .fetch_one(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        Ok(serde_json::json!({
            "worker_count": worker_count,
            "active_worker_count": active_count,
            "distributed_table_count": row.get::<i64, _>("distributed_tables"),
            "reference_table_count": row.get::<i64, _>("reference_tables"),
            "total_shards": row.get::<i64, _>("total_shards"),
            "nodes": nodes,
        }))
    }
}
