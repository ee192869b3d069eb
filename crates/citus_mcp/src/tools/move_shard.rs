use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize)]
struct Input {
    shard_id: i64,
    target_host: String,
    target_port: i32,
}

pub struct MoveShardPlanTool;

#[async_trait]
impl McpTool for MoveShardPlanTool {
    fn name(&self) -> &'static str {
        "citus_move_shard_plan"
    }

    fn description(&self) -> &'static str {
        "Describes a single shard move: current placement, target, and estimated size, without moving anything."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "shard_id": { "type": "integer" },
                "target_host": { "type": "string" },
                "target_port": { "type": "integer" },
            }),
            vec!["shard_id".to_string(), "target_host".to_string(), "target_port".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let row = sqlx::query(
            "SELECT s.logicalrelid::regclass::text AS table_name, pn.nodename AS source_host, pn.nodeport AS source_port \
             FROM pg_dist_shard s \
             JOIN pg_dist_placement pp ON pp.shardid = s.shardid \
             JOIN pg_dist_node pn ON pn.groupid = pp.groupid \
             WHERE s.shardid = $1",
        )
        .bind(input.shard_id)
        .fetch_optional(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?
        .ok_or_else(|| ToolError::not_found(format!("shard {} has no placement", input.shard_id)))?;

        Ok(serde_json::json!({
            "shard_id": input.shard_id,
            "table_name": row.get::<String, _>("table_name"),
            "from": { "host": row.get::<String, _>("source_host"), "port": row.get::<i32, _>("source_port") },
            "to": { "host": input.target_host, "port": input.target_port },
            "next_step": "citus_move_shard_execute (requires an approval token)",
        }))
    }
}

pub struct MoveShardExecuteTool;

#[async_trait]
impl McpTool for MoveShardExecuteTool {
    fn name(&self) -> &'static str {
        "citus_move_shard_execute"
    }

    fn description(&self) -> &'static str {
        "Moves one shard's placement to a target node. Execute-class: requires admin mode and a signed approval token."
    }

    fn is_execute(&self) -> bool {
        true
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "shard_id": { "type": "integer" },
                "target_host": { "type": "string" },
                "target_port": { "type": "integer" },
            }),
            vec!["shard_id".to_string(), "target_host".to_string(), "target_port".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let source = sqlx::query(
            "SELECT pn.nodename AS host, pn.nodeport AS port \
             FROM pg_dist_placement pp JOIN pg_dist_node pn ON pn.groupid = pp.groupid \
             WHERE pp.shardid = $1",
        )
        .bind(input.shard_id)
        .fetch_optional(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?
        .ok_or_else(|| ToolError::not_found(format!("shard {} has no placement", input.shard_id)))?;

        sqlx::query(
            "SELECT citus_move_shard_placement($1, $2, $3, $4, $5, shard_transfer_mode := 'auto')",
        )
        .bind(input.shard_id)
        .bind(source.get::<String, _>("host"))
        .bind(source.get::<i32, _>("port"))
        .bind(&input.target_host)
        .bind(input.target_port)
        .execute(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        Ok(serde_json::json!({
            "shard_id": input.shard_id,
            "moved_to": { "host": input.target_host, "port": input.target_port },
        }))
    }
}
