use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize)]
struct Input {
    table_name: String,
}

pub struct TableInspectorTool;

#[async_trait]
impl McpTool for TableInspectorTool {
    fn name(&self) -> &'static str {
        "citus_table_inspector"
    }

    fn description(&self) -> &'static str {
        "Distribution metadata, colocation group, and shard count for one table."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "table_name": { "type": "string" } }),
            vec!["table_name".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let row = sqlx::query(
            "SELECT logicalrelid::regclass::text AS table_name, \
                    partmethod, colocationid, \
                    column_to_column_name(logicalrelid, partkey) AS distribution_column, \
                    (SELECT count(*) FROM pg_dist_shard s WHERE s.logicalrelid = pg_dist_partition.logicalrelid) AS shard_count \
             FROM pg_dist_partition \
             WHERE logicalrelid = $1::regclass",
        )
        .bind(&input.table_name)
        .fetch_optional(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?
        .ok_or_else(|| ToolError::not_found(format!("table '{}' is not distributed", input.table_name)))?;

        Ok(serde_json::json!({
            "table_name": row.get::<String, _>("table_name"),
            "partition_method": row.get::<Option<String>, _>("partmethod"),
            "colocation_id": row.get::<i32, _>("colocationid"),
            "distribution_column": row.get::<Option<String>, _>("distribution_column"),
            "shard_count": row.get::<i64, _>("shard_count"),
        }))
    }
}
