use async_trait::async_trait;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct MetadataHealthTool;

#[async_trait]
impl McpTool for MetadataHealthTool {
    fn name(&self) -> &'static str {
        "citus_metadata_health"
    }

    fn description(&self) -> &'static str {
        "Checks pg_dist_node against pg_dist_partition/pg_dist_placement for orphaned shards and stale metadata."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let mut issues = Vec::new();

        let orphaned_placements: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM pg_dist_placement pp \
             WHERE NOT EXISTS (SELECT 1 FROM pg_dist_node pn WHERE pn.groupid = pp.groupid)",
        )
        .fetch_one(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;
        if orphaned_placements > 0 {
            issues.push(format!(
                "{orphaned_placements} shard placement(s) reference a group with no matching pg_dist_node row"
            ));
        }

        let shards_without_placement: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM pg_dist_shard s \
             WHERE NOT EXISTS (SELECT 1 FROM pg_dist_placement pp WHERE pp.shardid = s.shardid)",
        )
        .fetch_one(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;
        if shards_without_placement > 0 {
            issues.push(format!("{shards_without_placement} shard(s) have no placement"));
        }

        let partitions_without_shards: Vec<String> = sqlx::query_scalar(
            "SELECT logicalrelid::regclass::text FROM pg_dist_partition p \
             WHERE NOT EXISTS (SELECT 1 FROM pg_dist_shard s WHERE s.logicalrelid = p.logicalrelid)",
        )
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;
        if !partitions_without_shards.is_empty() {
            issues.push(format!(
                "{} distributed table(s) have no shards: {}",
                partitions_without_shards.len(),
                partitions_without_shards.join(", ")
            ));
        }

        Ok(serde_json::json!({
            "healthy": issues.is_empty(),
            "issues": issues,
        }))
    }
}
