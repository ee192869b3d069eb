use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

const CHECKED_SETTINGS: &[&str] = &[
    "citus.shard_count",
    "citus.shard_replication_factor",
    "max_connections",
    "statement_timeout",
];

pub struct ConfigAdvisorTool;

#[async_trait]
impl McpTool for ConfigAdvisorTool {
    fn name(&self) -> &'static str {
        "citus_config_advisor"
    }

    fn description(&self) -> &'static str {
        "Reports current coordinator GUC values for settings that commonly need tuning on a distributed cluster."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let mut settings = Vec::with_capacity(CHECKED_SETTINGS.len());
        for name in CHECKED_SETTINGS {
            let value: Option<String> = sqlx::query("SELECT current_setting($1, true) AS value")
                .bind(name)
                .fetch_one(ctx.workers.coordinator())
                .await
                .map_err(citus_db::DbError::from)?
                .get("value");
            settings.push(serde_json::json!({ "name": name, "value": value }));
        }

        let mut recommendations = Vec::new();
        if let Some(replication_factor) = settings
            .iter()
            .find(|s| s["name"] == "citus.shard_replication_factor")
            .and_then(|s| s["value"].as_str())
            .and_then(|v| v.parse::<i32>().ok())
        {
            if replication_factor > 1 {
                recommendations.push(
                    "citus.shard_replication_factor > 1 is unusual for a coordinator-managed \
                     replication setup; most deployments rely on Postgres streaming replication \
                     instead"
                        .to_string(),
                );
            }
        }

        Ok(serde_json::json!({
            "settings": settings,
            "recommendations": recommendations,
        }))
    }
}
