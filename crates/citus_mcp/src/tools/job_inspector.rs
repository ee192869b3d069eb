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
    job_id: Option<i64>,
}

pub struct JobInspectorTool;

#[async_trait]
impl McpTool for JobInspectorTool {
    fn name(&self) -> &'static str {
        "citus_job_inspector"
    }

    fn description(&self) -> &'static str {
        "Background job status from pg_dist_background_job, optionally filtered to one job."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "job_id": { "type": "integer" } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        let present: bool = sqlx::query_scalar("SELECT to_regclass('pg_dist_background_job') IS NOT NULL")
            .fetch_one(ctx.workers.coordinator())
            .await
            .map_err(citus_db::DbError::from)?;
        if !present {
            return Err(ToolError::unavailable(
                "background job tracking is not available on this Citus version",
            ));
        }

        let rows = sqlx::query(
            "SELECT job_id, state, job_type, description, started_at, finished_at \
             FROM pg_dist_background_job \
             WHERE ($1::bigint IS NULL OR job_id = $1) \
             ORDER BY job_id DESC \
             LIMIT 100",
        )
        .bind(input.job_id)
        .fetch_all(ctx.workers.coordinator())
        .await
        .map_err(citus_db::DbError::from)?;

        let (rows, rows_truncated) = ctx.output_budget.enforce_rows(rows);
        let mut truncated = rows_truncated;
        let jobs: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let description = row.get::<Option<String>, _>("description").map(|d| {
                    let (d, d_truncated) = ctx.output_budget.enforce_text(&d);
                    truncated |= d_truncated;
                    d
                });
                serde_json::json!({
                    "job_id": row.get::<i64, _>("job_id"),
                    "state": row.get::<String, _>("state"),
                    "job_type": row.get::<Option<String>, _>("job_type"),
                    "description": description,
                    "started_at": row.get::<Option<chrono::NaiveDateTime>, _>("started_at").map(|t| t.to_string()),
                    "finished_at": row.get::<Option<chrono::NaiveDateTime>, _>("finished_at").map(|t| t.to_string()),
                })
            })
            .collect();

        Ok(serde_json::json!({ "jobs": jobs, "truncated": truncated }))
    }
}
