use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::capabilities::CITUS_SHARD_SIZES;
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Metric {
    ShardCount,
    Bytes,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::ShardCount
    }
}

#[derive(Debug, Deserialize, Default)]
struct Input {
    #[serde(default)]
    metric: Metric,
}

pub struct ShardSkewReportTool;

fn skew_ratio(values: impl Iterator<Item = f64>) -> f64 {
    let positives: Vec<f64> = values.filter(|v| *v > 0.0).collect();
    if positives.is_empty() {
        return 0.0;
    }
    let max = positives.iter().cloned().fold(f64::MIN, f64::max);
    let min = positives.iter().cloned().fold(f64::MAX, f64::min);
    if min <= 0.0 {
        0.0
    } else {
        max / min
    }
}

#[async_trait]
impl McpTool for ShardSkewReportTool {
    fn name(&self) -> &'static str {
        "citus_shard_skew_report"
    }

    fn description(&self) -> &'static str {
        "Per-worker skew ratio by shard count or disk size, without the full snapshot advisor pipeline."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({ "metric": { "type": "string", "enum": ["shard_count", "bytes"] } }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        match input.metric {
            Metric::ShardCount => {
                let rows = sqlx::query(
                    "SELECT pn.nodeid AS node_id, pn.nodename AS host, pn.nodeport AS port, \
                            count(ps.shardid) AS shard_count \
                     FROM pg_dist_node pn \
                     LEFT JOIN pg_dist_placement pp ON pp.groupid = pn.groupid \
                     LEFT JOIN pg_dist_shard ps ON ps.shardid = pp.shardid \
                     WHERE pn.isactive AND pn.shouldhaveshards \
                     GROUP BY pn.nodeid, pn.nodename, pn.nodeport \
                     ORDER BY pn.nodeid",
                )
                .fetch_all(ctx.workers.coordinator())
                .await
                .map_err(citus_db::DbError::from)?;

                let per_node: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        serde_json::json!({
                            "node_id": row.get::<i32, _>("node_id"),
                            "host": row.get::<String, _>("host"),
                            "port": row.get::<i32, _>("port"),
                            "shard_count": row.get::<i64, _>("shard_count"),
                        })
                    })
                    .collect();
                let ratio = skew_ratio(rows.iter().map(|row| row.get::<i64, _>("shard_count") as f64));

                Ok(serde_json::json!({
                    "metric": "shard_count",
                    "skew_ratio": ratio,
                    "per_node": per_node,
                }))
            }
            Metric::Bytes => {
                if !ctx.capabilities.has(CITUS_SHARD_SIZES) {
                    return Err(ToolError::unavailable(
                        "citus_shard_sizes() is not available on this Citus version; use metric=shard_count",
                    ));
                }

                let rows = sqlx::query(
                    "SELECT pn.nodeid AS node_id, pn.nodename AS host, pn.nodeport AS port, \
                            coalesce(sum(s.shard_size), 0) AS bytes \
                     FROM pg_dist_node pn \
                     LEFT JOIN citus_shard_sizes() s ON true \
                     LEFT JOIN pg_dist_placement pp ON pp.shardid = s.shard_id AND pp.groupid = pn.groupid \
                     WHERE pn.isactive AND pn.shouldhaveshards \
                     GROUP BY pn.nodeid, pn.nodename, pn.nodeport \
                     ORDER BY pn.nodeid",
                )
                .fetch_all(ctx.workers.coordinator())
                .await
                .map_err(citus_db::DbError::from)?;

                let per_node: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        serde_json::json!({
                            "node_id": row.get::<i32, _>("node_id"),
                            "host": row.get::<String, _>("host"),
                            "port": row.get::<i32, _>("port"),
                            "bytes": row.get::<i64, _>("bytes"),
                        })
                    })
                    .collect();
                let ratio = skew_ratio(rows.iter().map(|row| row.get::<i64, _>("bytes") as f64));

                Ok(serde_json::json!({
                    "metric": "bytes",
                    "skew_ratio": ratio,
                    "per_node": per_node,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_ratio_ignores_zero_values() {
        assert!((skew_ratio([10.0, 0.0, 5.0].into_iter()) - 2.0).abs() < 1e-9);
    }
}
