//! Per-call policy gate (spec.md §4.3): is this tool allowed to run, and if
//! it carries raw SQL, is that SQL read-only?

use citus_db::validate_read_only;

use crate::config::Configuration;
use crate::errors::ToolError;
use crate::tokens::{ApprovalToken, TokenAuthority, TokenError};

pub struct Guardrails {
    allow_execute: bool,
    tokens: Option<TokenAuthority>,
}

impl Guardrails {
    pub fn new(config: &Configuration) -> Self {
        let tokens = if config.approval_secret.is_empty() {
            None
        } else {
            TokenAuthority::new(config.approval_secret.clone().into_bytes()).ok()
        };
        Self {
            allow_execute: config.is_execute_allowed(),
            tokens,
        }
    }

    /// `RequireToolAllowed(tool, is_execute, token)` per spec.md §4.3.
    pub fn require_tool_allowed(
        &self,
        tool: &str,
        is_execute: bool,
        token: Option<&str>,
    ) -> Result<(), ToolError> {
        if !is_execute {
            return Ok(());
        }
        if !self.allow_execute {
            return Err(ToolError::execute_disabled());
        }
        let action = format!("tool:{tool}");
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(ToolError::approval_required(action)),
        };
        let authority = self
            .tokens
            .as_ref()
            .ok_or_else(|| ToolError::internal("approval secret not configured"))?;
        authority
            .validate(token, &action)
            .map_err(|e| token_error_to_tool_error(e, &action))
    }

    /// Issue an approval token for `action`, gated on admin mode being
    /// enabled and a signing secret being configured.
    pub fn issue_token(&self, action: &str, ttl_seconds: i64) -> Result<ApprovalToken, ToolError> {
        if !self.allow_execute {
            return Err(ToolError::execute_disabled());
        }
        let authority = self
            .tokens
            .as_ref()
            .ok_or_else(|| ToolError::internal("approval secret not configured"))?;
        authority.issue(action, ttl_seconds)
    }

    /// `RequireReadOnlySQL(sql)` per spec.md §4.3.
    pub fn require_read_only_sql(&self, sql: &str) -> Result<(), ToolError> {
        if self.allow_execute {
            return Ok(());
        }
        validate_read_only(sql).map_err(|e| {
            ToolError::permission_denied(format!("statement is not read-only: {e}"))
        })
    }
}

fn token_error_to_tool_error(err: TokenError, action: &str) -> ToolError {
    ToolError::approval_required(action).with_details(serde_json::json!({
        "reason": format!("{err:?}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::errors::ErrorKind;

    fn admin_config(secret: &str) -> Configuration {
        Configuration {
            mode: Mode::Admin,
            allow_execute: true,
            approval_secret: secret.to_string(),
            ..Configuration::default()
        }
    }

    #[test]
    fn read_only_tools_always_pass() {
        let guardrails = Guardrails::new(&Configuration::default());
        assert!(guardrails.require_tool_allowed("ping", false, None).is_ok());
    }

    #[test]
    fn execute_tool_without_admin_mode_is_disabled() {
        let guardrails = Guardrails::new(&Configuration::default());
        let err = guardrails
            .require_tool_allowed("citus_rebalance_execute", true, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorKind::ExecuteDisabled);
    }

    #[test]
    fn execute_tool_without_token_requires_approval() {
        let guardrails = Guardrails::new(&admin_config("s"));
        let err = guardrails
            .require_tool_allowed("citus_rebalance_execute", true, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorKind::ApprovalRequired);
    }

    #[test]
    fn execute_tool_with_valid_token_passes() {
        let config = admin_config("s");
        let guardrails = Guardrails::new(&config);
        let authority = TokenAuthority::new(b"s".to_vec()).unwrap();
        let token = authority
            .issue("tool:citus_rebalance_execute", 60)
            .unwrap();
        assert!(guardrails
            .require_tool_allowed("citus_rebalance_execute", true, Some(token.as_str()))
            .is_ok());
    }

    #[test]
    fn admin_mode_allows_any_sql() {
        let guardrails = Guardrails::new(&admin_config("s"));
        assert!(guardrails.require_read_only_sql("DELETE FROM t").is_ok());
    }

    #[test]
    fn read_only_mode_rejects_write_sql() {
        let guardrails = Guardrails::new(&Configuration::default());
        let err = guardrails
            .require_read_only_sql("DELETE FROM t")
            .unwrap_err();
        assert_eq!(err.code, ErrorKind::PermissionDenied);
    }
}
