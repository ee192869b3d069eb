use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

pub struct LockInspectorTool;

#[async_trait]
impl McpTool for LockInspectorTool {
    fn name(&self) -> &'static str {
        "citus_lock_inspector"
    }

    fn description(&self) -> &'static str {
        "Blocking and blocked lock holders on the coordinator, for diagnosing stuck DDL or contention."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let rows = sqlx::query(
            "SELECT blocked.pid AS blocked_pid, blocked.query AS blocked_query, \
                    blocking.pid AS blocking_pid, blocking.query AS blocking_query \
             FROM pg_locks bl \
             JOIN pg_stat_activity blocked ON blocked.pid = bl.pid \
             JOIN pg_locks kl ON kl.locktype = bl.locktype \
                 AND kl.database IS NOT DISTINCT FROM bl.database \
                 AND kl.relation IS NOT DISTINCT FROM bl.relation \
                 AND kl.page IS NOT DISTINCT FROM bl.page \
                 AND kl.tuple IS NOT DISTINCT FROM bl.tuple \
                 AND kl.transactionid IS NOT DISTINCT FROM bl.transactionid \
                 AND kl.pid != bl.pid AND kl.granted \
             JOIN pg_stat_activity blocking ON blocking.pid = kl.pid \
             WHERE NOT bl.granted",
        )
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let (rows, rows_truncated) = ctx.output_budget.enforce_rows(rows);
        let mut truncated = rows_truncated;
        let blocks: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let (blocked_query, t1) = ctx.output_budget.enforce_text(&row.get::<String, _>("blocked_query"));
                let (blocking_query, t2) = ctx.output_budget.enforce_text(&row.get::<String, _>("blocking_query"));
                truncated |= t1 || t2;
                serde_json::json!({
                    "blocked_pid": row.get::<i32, _>("blocked_pid"),
                    "blocked_query": blocked_query,
                    "blocking_pid": row.get::<i32, _>("blocking_pid"),
                    "blocking_query": blocking_query,
                })
            })
            .collect();

        Ok(serde_json::json!({ "blocks": blocks, "truncated": truncated }))
    }
}
