//! MCP tool implementations (spec.md §4.9, §6 tool catalogue).
//!
//! Each tool is a named handler registered into a table at startup
//! (spec.md §9 "Dynamic dispatch over tools") rather than a trait-object
//! hierarchy keyed by type.

mod registry;

mod advisor;
mod cluster_summary;
mod colocation_inspector;
mod config_advisor;
mod explain_query;
mod job_inspector;
mod list_distributed_tables;
mod list_nodes;
mod list_shards;
mod lock_inspector;
mod metadata_health;
mod move_shard;
mod node_prepare_advisor;
mod ping;
mod rebalance;
mod request_approval_token;
mod server_info;
mod shard_heatmap;
mod shard_skew_report;
mod snapshot_source_advisor;
mod table_inspector;
mod validate_rebalance_prereqs;
mod worker_activity;

pub use registry::ToolRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::ResultCache;
use crate::capabilities::Capabilities;
use crate::config::Configuration;
use crate::errors::ToolError;
use crate::guardrails::Guardrails;
use crate::protocol::ToolDefinition;
use crate::security::OutputBudget;
use crate::types::ToolInputSchema;
use crate::worker_manager::WorkerManager;

/// Dependencies threaded into every tool call. Cheap to clone: everything
/// behind it is already an `Arc` or a pooled handle.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Configuration>,
    pub workers: Arc<WorkerManager>,
    pub guardrails: Arc<Guardrails>,
    pub cache: Arc<ResultCache>,
    pub capabilities: Arc<Capabilities>,
    pub output_budget: Arc<OutputBudget>,
}

/// Per-call input: raw JSON arguments plus an optional approval token
/// (pulled out of `arguments.approval_token` by `server::extract_approval_token`
/// before a tool ever sees the call).
pub struct ToolCall {
    pub arguments: Value,
    pub approval_token: Option<String>,
}

/// One entry in the tool table (spec.md §9). `is_execute` gates the call
/// behind `Guardrails::require_tool_allowed` before `execute` runs.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> ToolInputSchema;
    fn is_execute(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: serde_json::to_value(self.input_schema())
                .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
        }
    }
}
