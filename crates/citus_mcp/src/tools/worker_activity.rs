use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct ActivityTool;

#[async_trait]
impl McpTool for ActivityTool {
    fn name(&self) -> &'static str {
        "citus_activity"
    }

    fn description(&self) -> &'static str {
        "Running distributed queries across the coordinator and reachable workers."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let (pools, nodes) = ctx.workers.pools().await;
        let node_ids: Vec<i32> = nodes.iter().map(|n| n.node_id).collect();
        let budget = ctx.output_budget.clone();

        let mut warnings = Vec::new();
        let mut truncated = false;
        let results = ctx
            .workers
            .fan_out(&node_ids, move |_node_id, pool| {
                let budget = budget.clone();
                async move {
                    let rows = sqlx::query(
                        "SELECT pid, query, state, now() - query_start AS duration \
                         FROM pg_stat_activity \
                         WHERE state = 'active' AND query NOT LIKE '%pg_stat_activity%'",
                    )
                    .fetch_all(&pool)
                    .await
                    .map_err(citus_db::DbError::from)?;

                    let (rows, rows_truncated) = budget.enforce_rows(rows);
                    let mut text_truncated = false;
                    let activity: Vec<Value> = rows
                        .into_iter()
                        .map(|row| {
                            let (query, query_truncated) = budget.enforce_text(&row.get::<String, _>("query"));
                            text_truncated |= query_truncated;
                            serde_json::json!({
                                "pid": row.get::<i32, _>("pid"),
                                "query": query,
                                "state": row.get::<String, _>("state"),
                            })
                        })
                        .collect();
                    Ok::<(Vec<Value>, bool), ToolError>((activity, rows_truncated || text_truncated))
                }
            })
            .await;
        let _ = pools;

        let mut by_node = serde_json::Map::new();
        for (node_id, result) in results {
            match result {
                Ok((activity, node_truncated)) => {
                    truncated |= node_truncated;
                    by_node.insert(node_id.to_string(), Value::Array(activity));
                }
                Err(e) => {
                    warnings.push(format!("node {node_id}: {e}"));
                }
            }
        }

        let coordinator_rows = sqlx::query(
            "SELECT pid, query, state \
             FROM pg_stat_activity \
             WHERE state = 'active' AND query NOT LIKE '%pg_stat_activity%'",
        )
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let (coordinator_rows, coordinator_rows_truncated) = ctx.output_budget.enforce_rows(coordinator_rows);
        truncated |= coordinator_rows_truncated;
        let coordinator_activity: Vec<Value> = coordinator_rows
            .into_iter()
            .map(|row| {
                let (query, query_truncated) = ctx.output_budget.enforce_text(&row.get::<String, _>("query"));
                truncated |= query_truncated;
                serde_json::json!({
                    "pid": row.get::<i32, _>("pid"),
                    "query": query,
                    "state": row.get::<String, _>("state"),
                })
            })
            .collect();

        Ok(serde_json::json!({
            "coordinator": coordinator_activity,
            "workers": by_node,
            "warnings": warnings,
            "truncated": truncated,
        }))
    }
}
