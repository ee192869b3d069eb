use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

#[derive(Debug, Clone, Serialize)]
struct DistributedTable {
    table_name: String,
    schema_name: String,
    citus_table_type: String,
    distribution_column: Option<String>,
    shard_count: i64,
}

async fn query_tables(ctx: &ToolContext, table_type: Option<&str>) -> Result<Vec<DistributedTable>, ToolError> {
    let rows = sqlx::query(
        "SELECT logicalrelid::regclass::text AS table_name, \
                n.nspname AS schema_name, \
                CASE WHEN partkey IS NULL THEN 'reference' ELSE 'distributed' END AS citus_table_type, \
                column_to_column_name(logicalrelid, partkey) AS distribution_column, \
                (SELECT count(*) FROM pg_dist_shard s WHERE s.logicalrelid = pg_dist_partition.logicalrelid) AS shard_count \
         FROM pg_dist_partition \
         JOIN pg_class c ON c.oid = logicalrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         ORDER BY table_name",
    )
    .fetch_all(ctx.workers.coordinator())
    .await
    .map_err(citus_db::DbError::from)?;

    let mut tables: Vec<DistributedTable> = rows
        .into_iter()
        .map(|row| DistributedTable {
            table_name: row.get("table_name"),
            schema_name: row.get("schema_name"),
            citus_table_type: row.get("citus_table_type"),
            distribution_column: row.get("distribution_column"),
            shard_count: row.get("shard_count"),
        })
        .collect();

    if let Some(table_type) = table_type {
        tables.retain(|t| t.citus_table_type == table_type);
    }
    Ok(tables)
}

pub struct ListDistributedTablesTool;

#[async_trait]
impl McpTool for ListDistributedTablesTool {
    fn name(&self) -> &'static str {
        "list_distributed_tables"
    }

    fn description(&self) -> &'static str {
        "List distributed and reference tables known to the coordinator."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, ctx: &ToolContext, _call: ToolCall) -> Result<Value, ToolError> {
        let tables = query_tables(ctx, None).await?;
        let (tables, truncated) = ctx.output_budget.enforce_rows(tables);
        Ok(serde_json::json!({ "tables": tables, "truncated": truncated }))
    }
}

#[derive(Debug, Deserialize, Default)]
struct V2Input {
    #[serde(default)]
    table_type: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    page_size: Option<usize>,
}

pub struct CitusListDistributedTablesV2Tool;

#[async_trait]
impl McpTool for CitusListDistributedTablesV2Tool {
    fn name(&self) -> &'static str {
        "citus_list_distributed_tables"
    }

    fn description(&self) -> &'static str {
        "List distributed/reference tables with pagination and table_type filtering (v2)."
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "table_type": { "type": "string", "enum": ["distributed", "reference"] },
                "page": { "type": "integer", "minimum": 1 },
                "page_size": { "type": "integer", "minimum": 1 },
            }),
            vec![],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: V2Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        if let Some(ref t) = input.table_type {
            if t != "distributed" && t != "reference" {
                return Err(ToolError::invalid_input(
                    "table_type must be 'distributed' or 'reference'",
                ));
            }
        }

        let tables = query_tables(ctx, input.table_type.as_deref()).await?;
        let page = input.page.unwrap_or(1).max(1);
        let page_size = input.page_size.unwrap_or(ctx.config.max_rows).min(ctx.config.max_rows);
        let start = (page - 1) * page_size;
        let page_items: Vec<_> = tables.iter().skip(start).take(page_size).cloned().collect();

        Ok(serde_json::json!({
            "tables": page_items,
            "page": page,
            "page_size": page_size,
            "total": tables.len(),
            "truncated": start + page_items.len() < tables.len(),
        }))
    }
}
