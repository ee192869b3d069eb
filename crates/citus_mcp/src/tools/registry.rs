//! Tool registry: discovery (`tools/list`) and dispatch (`tools/call`).

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use super::*;
use crate::errors::ToolError;

pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Box::new(ping::PingTool));
        registry.register(Box::new(server_info::ServerInfoTool));
        registry.register(Box::new(list_nodes::ListNodesTool));
        registry.register(Box::new(list_distributed_tables::ListDistributedTablesTool));
        registry.register(Box::new(list_distributed_tables::CitusListDistributedTablesV2Tool));
        registry.register(Box::new(list_shards::ListShardsTool));
        registry.register(Box::new(cluster_summary::ClusterSummaryTool));
        registry.register(Box::new(table_inspector::TableInspectorTool));
        registry.register(Box::new(colocation_inspector::ColocationInspectorTool));
        registry.register(Box::new(worker_activity::ActivityTool));
        registry.register(Box::new(lock_inspector::LockInspectorTool));
        registry.register(Box::new(job_inspector::JobInspectorTool));
        registry.register(Box::new(shard_heatmap::ShardHeatmapTool));
        registry.register(Box::new(shard_skew_report::ShardSkewReportTool));
        registry.register(Box::new(explain_query::ExplainQueryTool));
        registry.register(Box::new(advisor::AdvisorTool));
        registry.register(Box::new(config_advisor::ConfigAdvisorTool));
        registry.register(Box::new(snapshot_source_advisor::SnapshotSourceAdvisorTool));
        registry.register(Box::new(validate_rebalance_prereqs::ValidateRebalancePrereqsTool));
        registry.register(Box::new(metadata_health::MetadataHealthTool));
        registry.register(Box::new(node_prepare_advisor::NodePrepareAdvisorTool));
        registry.register(Box::new(rebalance::RebalancePlanTool));
        registry.register(Box::new(rebalance::RebalanceExecuteTool));
        registry.register(Box::new(rebalance::RebalanceStatusTool));
        registry.register(Box::new(move_shard::MoveShardPlanTool));
        registry.register(Box::new(move_shard::MoveShardExecuteTool));
        registry.register(Box::new(request_approval_token::RequestApprovalTokenTool));

        debug!(count = registry.tools.len(), "registered tools");
        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn list_tools(&self) -> Vec<crate::protocol::ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Dispatch order per spec.md §4.9: schema validation against the
    /// tool's declared `input_schema` runs first, so malformed input is
    /// always `invalid_input` rather than being shadowed by a guardrails
    /// rejection; guardrails run next; cache lookup (if the tool opts in)
    /// happens inside the tool body, which has the cache key shape.
    pub async fn call_tool(
        &self,
        name: &str,
        call: ToolCall,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::not_found(format!("unknown tool: {name}")))?;

        tool.input_schema().validate(&call.arguments)?;

        ctx.guardrails.require_tool_allowed(
            tool.name(),
            tool.is_execute(),
            call.approval_token.as_deref(),
        )?;

        tool.execute(ctx, call).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_full_catalogue() {
        let registry = ToolRegistry::new();
        for name in [
            "ping",
            "server_info",
            "list_nodes",
            "list_distributed_tables",
            "citus_list_distributed_tables",
            "list_shards",
            "citus_cluster_summary",
            "citus_table_inspector",
            "citus_colocation_inspector",
            "citus_activity",
            "citus_lock_inspector",
            "citus_job_inspector",
            "citus_shard_heatmap",
            "citus_shard_skew_report",
            "citus_explain_query",
            "citus_advisor",
            "citus_config_advisor",
            "citus_snapshot_source_advisor",
            "citus_validate_rebalance_prereqs",
            "citus_metadata_health",
            "citus_node_prepare_advisor",
            "citus_rebalance_plan",
            "citus_rebalance_execute",
            "citus_rebalance_status",
            "citus_move_shard_plan",
            "citus_move_shard_execute",
            "citus_request_approval_token",
        ] {
            assert!(registry.has_tool(name), "missing tool: {name}");
        }
    }

    #[test]
    fn unknown_tool_is_not_registered() {
        let registry = ToolRegistry::new();
        assert!(!registry.has_tool("does_not_exist"));
    }
}
