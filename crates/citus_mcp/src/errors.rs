//! Tool error taxonomy and the tool result envelope.
//!
//! Every tool body returns `Result<Value, ToolError>`. The dispatcher in
//! `server.rs` turns an `Err(ToolError)` into `{ is_error: true,
//! structured_content: ErrorPayload }`; it never lets a raw exception or a
//! `anyhow::Error` escape across the tool boundary (that class is reserved
//! for startup/transport faults, see `citus_mcp_cli`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use citus_db::{redact_dsn, DbError};

/// Error kind codes surfaced to the calling agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    PermissionDenied,
    ApprovalRequired,
    ExecuteDisabled,
    NotFound,
    Timeout,
    Unavailable,
    PartialResults,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::PermissionDenied => "permission_denied",
            Self::ApprovalRequired => "approval_required",
            Self::ExecuteDisabled => "execute_disabled",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::PartialResults => "partial_results",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `ErrorPayload` of spec.md §3/§6: `{ code, message, hint?, details? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn approval_required(action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ErrorKind::ApprovalRequired,
            format!("approval token required for action '{action}'"),
        )
        .with_details(serde_json::json!({ "action": action }))
    }

    pub fn execute_disabled() -> Self {
        Self::new(
            ErrorKind::ExecuteDisabled,
            "server is running in read-only mode; this tool requires allow_execute",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, redact_dsn(&message.into()))
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<DbError> for ToolError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Timeout => Self::timeout("database operation timed out"),
            DbError::Closed => Self::unavailable(redact_dsn(&err.to_string())),
            DbError::NotFound(_) => Self::not_found(redact_dsn(&err.to_string())),
            other => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_redacts_dsn_in_message() {
        let err = ToolError::internal("failed: postgres://u:p@h/d");
        assert!(!err.message.contains(":p@"));
    }

    #[test]
    fn approval_required_carries_action_in_details() {
        let err = ToolError::approval_required("tool:citus_rebalance_execute");
        assert_eq!(err.code, ErrorKind::ApprovalRequired);
        assert_eq!(
            err.details.unwrap()["action"],
            "tool:citus_rebalance_execute"
        );
    }

    #[test]
    fn serializes_with_snake_case_code() {
        let err = ToolError::invalid_input("bad");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "invalid_input");
    }

    #[test]
    fn closed_pool_maps_to_unavailable() {
        let err = ToolError::from(DbError::Closed);
        assert_eq!(err.code, ErrorKind::Unavailable);
    }
}
