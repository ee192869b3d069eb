use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize, Default)]
struct PlanInput {
    #[serde(default)]
    strategy: Option<String>,
}

pub struct RebalancePlanTool;

#[async_trait]
impl McpTool for RebalancePlanTool {
    fn name(&self) -> &'static str {
        "citus_rebalance_plan"
    }

    fn description(&self) -> &'static str {
        "Computes the shard moves a rebalance would perform, without moving anything."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "strategy": { "type": "string" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: PlanInput = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT table_name::text, shardid, shard_size, sourcename, sourceport, \
                    targetname, targetport \
             FROM get_rebalance_table_shards_plan(rebalance_strategy := $1)",
        )
        .bind(input.strategy.as_deref())
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let moves: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                serde_json::json!({
                    "table_name": row.get::<String, _>("table_name"),
                    "shard_id": row.get::<i64, _>("shardid"),
                    "shard_size": row.get::<i64, _>("shard_size"),
                    "from": { "host": row.get::<String, _>("sourcename"), "port": row.get::<i32, _>("sourceport") },
                    "to": { "host": row.get::<String, _>("targetname"), "port": row.get::<i32, _>("targetport") },
                })
            })
            .collect();

        let (moves, truncated) = ctx.output_budget.enforce_rows(moves);
        Ok(serde_json::json!({
            "moves": moves,
            "truncated": truncated,
            "next_step": "citus_rebalance_execute (requires an approval token)",
        }))
    }
}

#[derive(Debug, Deserialize, Default)]
struct ExecuteInput {
    #[serde(default)]
    strategy: Option<String>,
}

pub struct RebalanceExecuteTool;

#[async_trait]
impl McpTool for RebalanceExecuteTool {
    fn name(&self) -> &'static str {
        "citus_rebalance_execute"
    }

    fn description(&self) -> &'static str {
        "Starts a background shard rebalance job. Execute-class: requires admin mode and a signed approval token."
    }

    fn is_execute(&self) -> bool {
        true
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "strategy": { "type": "string" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: ExecuteInput = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let row = sqlx::query("SELECT job_id FROM citus_rebalance_start(rebalance_strategy := $1)")
            .bind(input.strategy.as_deref())
            .fetch_one(ctx.workers.coordinator())
            .await
            .map_err(citus_db::DbError::from)?;

        Ok(serde_json::json!({
            "job_id": row.get::<i64, _>("job_id"),
            "next_step": "citus_rebalance_status",
        }))
    }
}

#[derive(Debug, Deserialize, Default)]
struct StatusInput {
    #[serde(default)]
    job_id: Option<i64>,
}

pub struct RebalanceStatusTool;

#[async_trait]
impl McpTool for RebalanceStatusTool {
    fn name(&self) -> &'static str {
        "citus_rebalance_status"
    }

    fn description(&self) -> &'static str {
        "Progress of a running or completed rebalance job."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "job_id": { "type": "integer" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: StatusInput = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT table_name::text, shardid, shard_size, sourcename, sourceport, \
                    targetname, targetport, progress, source_shard_size, target_shard_size \
             FROM get_rebalance_progress() \
             WHERE ($1::bigint IS NULL OR job_id = $1)",
        )
        .bind(input.job_id)
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let progress: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                serde_json::json!({
                    "table_name": row.get::<String, _>("table_name"),
                    "shard_id": row.get::<i64, _>("shardid"),
                    "shard_size": row.get::<i64, _>("shard_size"),
                    "from": { "host": row.get::<String, _>("sourcename"), "port": row.get::<i32, _>("sourceport") },
                    "to": { "host": row.get::<String, _>("targetname"), "port": row.get::<i32, _>("targetport") },
                    "progress": row.get::<i64, _>("progress"),
                })
            })
            .collect();

        let (progress, truncated) = ctx.output_budget.enforce_rows(progress);
        Ok(serde_json::json!({ "shard_moves": progress, "truncated": truncated }))
    }
}
