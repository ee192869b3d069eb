use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{McpTool, ToolCall, ToolContext};
use crate::errors::ToolError;
use crate::types::ToolInputSchema;

const EXECUTE_ACTIONS: &[&str] = &[
    "tool:citus_rebalance_execute",
    "tool:citus_move_shard_execute",
];

#[derive(Debug, Deserialize)]
struct Input {
    action: String,
    #[serde(default)]
    ttl_seconds: Option<i64>,
}

pub struct RequestApprovalTokenTool;

#[async_trait]
impl McpTool for RequestApprovalTokenTool {
    fn name(&self) -> &'static str {
        "citus_request_approval_token"
    }

    fn description(&self) -> &'static str {
        "Issues a signed, time-limited token authorizing one execute-class tool call."
    }

    // Not execute-class despite being listed alongside execute tools: it
    // issues the tokens those tools consume, so gating it behind a token of
    // its own would make bootstrapping impossible. It still requires admin
    // mode, enforced inside `Guardrails::issue_token`.
    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::with_properties(
            serde_json::json!({
                "action": { "type": "string", "enum": EXECUTE_ACTIONS },
                "ttl_seconds": { "type": "integer" },
            }),
            vec!["action".to_string()],
        )
    }

    async fn execute(&self, ctx: &ToolContext, call: ToolCall) -> Result<Value, ToolError> {
        let input: Input = serde_json::from_value(call.arguments)
            .map_err(|e| ToolError::invalid_input(e.to_string()))?;

        if !EXECUTE_ACTIONS.contains(&input.action.as_str()) {
            return Err(ToolError::invalid_input(format!(
                "unknown execute action: {}",
                input.action
            )));
        }

        let token = ctx
            .guardrails
            .issue_token(&input.action, input.ttl_seconds.unwrap_or(300))?;

        Ok(serde_json::json!({
            "action": input.action,
            "token": token.as_str(),
        }))
    }
}
