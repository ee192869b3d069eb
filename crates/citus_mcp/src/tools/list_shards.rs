use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize, Default)]
struct Input {
    #[serde(default)]
    table_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Shard {
    shard_id: i64,
    table_name: String,
    node_id: i32,
    shard_minvalue: Option<String>,
    shard_maxvalue: Option<String>,
}

pub struct ListShardsTool;

#[async_trait]
impl McpTool for ListShardsTool {
    fn name(&self) -> &'static str {
        "list_shards"
    }

    fn description(&self) -> &'static str {
        "List shard placements, optionally filtered to one distributed table."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "table_name": { "type": "string" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT s.shardid, s.logicalrelid::regclass::text AS table_name, \
                    pl.groupid AS node_id, s.shardminvalue, s.shardmaxvalue \
             FROM pg_dist_shard s \
             JOIN pg_dist_placement pl ON pl.shardid = s.shardid \
             WHERE ($1::text IS NULL OR s.logicalrelid::regclass::text = $1) \
             ORDER BY s.shardid",
        )
        .bind(&input.table_name)
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let shards: Vec<Shard> = rows
            .into_iter()
            .map(|row| Shard {
                shard_id: row.get("shardid"),
                table_name: row.get("table_name"),
                node_id: row.get("node_id"),
                shard_minvalue: row.get("shardminvalue"),
                shard_maxvalue: row.get("shardmaxvalue"),
            })
            .collect();

        let (shards, truncated) = ctx.output_budget.enforce_rows(shards);
        Ok(serde_json::json!({ "shards": shards, "truncated": truncated }))
    }
}
