//! End-to-end tool dispatch tests: build a `ToolContext` with a lazy
//! coordinator pool (never actually connects) and drive real tools through
//! `ToolRegistry::call_tool`, the same path `server::Server` uses.

use std::sync::Arc;

use citus_mcp::config::{Configuration, Mode};
use citus_mcp::tools::{ToolCall, ToolContext, ToolRegistry};
use citus_mcp::{Capabilities, Guardrails, ResultCache};
use citus_mcp::errors::ErrorKind;
use citus_mcp::worker_manager::WorkerManager;
use sqlx::postgres::PgPoolOptions;

fn lazy_ctx(config: Configuration) -> ToolContext {
    let coordinator = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://invalid:5432/invalid")
        .expect("lazy pool construction never touches the network");

    let config = Arc::new(config);
    let workers = Arc::new(WorkerManager::new(
        coordinator,
        config.fan_out_concurrency,
        std::time::Duration::from_secs(1),
        config.statement_timeout_ms,
    ));
    let guardrails = Arc::new(Guardrails::new(&config));

    ToolContext {
        config,
        workers,
        guardrails,
        cache: Arc::new(ResultCache::new()),
        capabilities: Arc::new(Capabilities::default()),
        output_budget: Arc::new(citus_mcp::OutputBudget::new(10_000, 8192)),
    }
}

fn call(arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        arguments,
        approval_token: None,
    }
}

#[tokio::test]
async fn ping_round_trips_through_the_registry() {
    let registry = ToolRegistry::new();
    let ctx = lazy_ctx(Configuration::default());

    let result = registry
        .call_tool("ping", call(serde_json::json!({})), &ctx)
        .await
        .unwrap();

    assert_eq!(result, serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn server_info_reports_effective_limits() {
    let registry = ToolRegistry::new();
    let mut config = Configuration::default();
    config.max_rows = 42;
    let ctx = lazy_ctx(config);

    let result = registry
        .call_tool("server_info", call(serde_json::json!({})), &ctx)
        .await
        .unwrap();

    assert_eq!(result["max_rows"], 42);
    assert_eq!(result["mode"], "read_only");
    assert_eq!(result["allow_execute"], false);
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let registry = ToolRegistry::new();
    let ctx = lazy_ctx(Configuration::default());

    let err = registry
        .call_tool("does_not_exist", call(serde_json::json!({})), &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::NotFound);
}

#[tokio::test]
async fn execute_tool_without_admin_mode_is_rejected_before_it_runs() {
    let registry = ToolRegistry::new();
    let ctx = lazy_ctx(Configuration::default());

    // citus_rebalance_execute never reaches its body: the coordinator pool
    // is a lazy stub that would error on first query, but guardrails reject
    // the call before `execute` is ever invoked.
    let err = registry
        .call_tool(
            "citus_rebalance_execute",
            call(serde_json::json!({"plan_id": "abc"})),
            &ctx,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::ExecuteDisabled);
}

#[tokio::test]
async fn execute_tool_in_admin_mode_without_token_requires_approval() {
    let registry = ToolRegistry::new();
    let mut config = Configuration::default();
    config.mode = Mode::Admin;
    config.allow_execute = true;
    config.approval_secret = "test-secret".to_string();
    let ctx = lazy_ctx(config);

    let err = registry
        .call_tool(
            "citus_rebalance_execute",
            call(serde_json::json!({"plan_id": "abc"})),
            &ctx,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorKind::ApprovalRequired);
}

#[tokio::test]
async fn registry_lists_every_registered_tool_with_a_schema() {
    let registry = ToolRegistry::new();
    let tools = registry.list_tools();

    assert!(tools.len() >= 27, "expected the full catalogue, got {}", tools.len());
    assert!(tools.iter().all(|t| t.input_schema.is_object()));
    assert!(tools.iter().any(|t| t.name == "ping"));
    assert!(tools.iter().any(|t| t.name == "citus_rebalance_plan"));
}
