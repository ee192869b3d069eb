use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Deserialize)]
struct Input {
    sql: String,
    #[serde(default)]
    analyze: bool,
}

pub struct ExplainQueryTool;

#[async_trait]
impl McpTool for ExplainQueryTool {
    fn name(&self) -> &'static str {
        "citus_explain_query"
    }

    fn description(&self) -> &'static str {
        "Distributed query plan for caller-supplied SQL. Read-only unless execute mode is enabled."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "sql": { "type": "string" },
                "analyze": { "type": "boolean" },
            }),
            vec!["sql".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        ctx.guardrails.require_read_only_sql(&input.sql)?;

        // ANALYZE actually runs the statement, so it's gated independently
        // of read-only classification: only allowed when execute is enabled.
        if input.analyze && !ctx.config.is_execute_allowed() {
            return Err(ToolError::permission_denied(
                "analyze=true executes the query; not permitted in read-only mode",
            ));
        }

        let options = if input.analyze {
            "(ANALYZE, FORMAT JSON)"
        } else {
            "(FORMAT JSON)"
        };
        let plan_sql = format!("EXPLAIN {options} {}", input.sql);

        let row = sqlx::query(&plan_sql)
            .fetch_one(ctx.workers.coordinator())
            .await
            .map_err(citus_db::DbError::from)?;

        let plan_text: String = row.get(0);
        let plan: Value = serde_json::from_str(&plan_text)
            .unwrap_or_else(|_| Value::String(plan_text.clone()));

        let (plan_text, truncated) = ctx.output_budget.enforce_text(&plan_text);
        Ok(serde_json::json!({
            "plan": plan,
            "plan_text": plan_text,
            "truncated": truncated,
        }))
    }
}
