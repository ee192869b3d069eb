use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize, Default)]
struct Input {
    #[serde(default)]
    colocation_id: Option<i32>,
}

pub struct ColocationInspectorTool;

#[async_trait]
impl McpTool for ColocationInspectorTool {
    fn name(&self) -> &'static str {
        "citus_colocation_inspector"
    }

    fn description(&self) -> &'static str {
        "List colocation groups and the tables co-placed in each, for joinability analysis."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "colocation_id": { "type": "integer" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT colocationid, \
                    array_agg(logicalrelid::regclass::text ORDER BY logicalrelid::regclass::text) AS tables, \
                    shardcount, replicationfactor \
             FROM pg_dist_partition p \
             JOIN pg_dist_colocation c ON c.colocationid = p.colocationid \
             WHERE ($1::int IS NULL OR p.colocationid = $1) \
             GROUP BY colocationid, shardcount, replicationfactor \
             ORDER BY colocationid",
        )
        .bind(input.colocation_id)
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let groups: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                serde_json::json!({
                    "colocation_id": row.get::<i32, _>("colocationid"),
                    "tables": row.get::<Vec<String>, _>("tables"),
                    "shard_count": row.get::<i32, _>("shardcount"),
                    "replication_factor": row.get::<i32, _>("replicationfactor"),
                })
            })
            .collect();

        let (groups, truncated) = ctx.output_budget.enforce_rows(groups);
        Ok(serde_json::json!({ "colocation_groups": groups, "truncated": truncated }))
    }
}
