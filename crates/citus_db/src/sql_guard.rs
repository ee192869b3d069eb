//! Read-only SQL classification.
//!
//! Classifies a SQL statement's first keyword after stripping leading
//! whitespace, `--` line comments, and `/* ... */` block comments. Used by
//! `citus_mcp::guardrails::Guardrails::require_read_only_sql` to decide
//! whether a statement may run when the server is not in execute mode.
//!
//! `WITH` is permitted even though a CTE can wrap a data-modifying statement
//! (`WITH x AS (DELETE FROM t RETURNING *) SELECT * FROM x`) in Postgres.
//! This is a documented lenience (spec §4.3, §9 open question a), not a
//! guarantee — admin mode (`allow_execute = true`) is the only way to run
//! such statements safely.

use std::fmt;

/// SQL keywords allowed to run without `allow_execute`.
const ALLOWED_KEYWORDS: &[&str] = &["select", "show", "explain", "values", "with"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlGuardError {
    pub keyword: Option<String>,
}

impl fmt::Display for SqlGuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.keyword {
            Some(kw) => write!(f, "statement starting with '{kw}' is not read-only"),
            None => write!(f, "statement has no recognizable leading keyword"),
        }
    }
}

impl std::error::Error for SqlGuardError {}

/// Returns `Ok(())` if `sql`'s first keyword (after stripping comments) is
/// one of `ALLOWED_KEYWORDS`, case-insensitively. Otherwise returns a
/// [`SqlGuardError`] naming the offending keyword (or `None` if the
/// statement was empty or had no leading keyword at all).
pub fn validate_read_only(sql: &str) -> Result<(), SqlGuardError> {
    match first_keyword(sql) {
        Some(kw) if ALLOWED_KEYWORDS.contains(&kw.as_str()) => Ok(()),
        other => Err(SqlGuardError { keyword: other }),
    }
}

/// Strip leading whitespace, `--` line comments, and `/* ... */` block
/// comments, then return the first alphabetic token, lowercased.
fn first_keyword(sql: &str) -> Option<String> {
    let stripped = strip_leading_comments_and_whitespace(sql);
    let mut chars = stripped.chars();
    let mut token = String::new();
    for ch in chars.by_ref() {
        if ch.is_ascii_alphabetic() {
            token.push(ch.to_ascii_lowercase());
        } else if token.is_empty() {
            // Non-alphabetic leading character (e.g. `;`, `1`): no keyword.
            return None;
        } else {
            break;
        }
    }
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn strip_leading_comments_and_whitespace(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            match after.find('\n') {
                Some(nl) => {
                    rest = &after[nl + 1..];
                    continue;
                }
                None => return "",
            }
        }
        if let Some(after) = trimmed.strip_prefix("/*") {
            match after.find("*/") {
                Some(end) => {
                    rest = &after[end + 2..];
                    continue;
                }
                None => return "",
            }
        }
        return trimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_select() {
        assert!(validate_read_only("SELECT 1").is_ok());
    }

    #[test]
    fn accepts_leading_line_comment() {
        assert!(validate_read_only("  -- hi\n SELECT 1").is_ok());
    }

    #[test]
    fn accepts_leading_block_comment() {
        assert!(validate_read_only("/* c */ EXPLAIN SELECT 1").is_ok());
    }

    #[test]
    fn accepts_with_cte() {
        assert!(validate_read_only("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
    }

    #[test]
    fn accepts_show_and_values() {
        assert!(validate_read_only("SHOW search_path").is_ok());
        assert!(validate_read_only("VALUES (1), (2)").is_ok());
    }

    #[test]
    fn rejects_update() {
        let err = validate_read_only("UPDATE t SET a=1").unwrap_err();
        assert_eq!(err.keyword.as_deref(), Some("update"));
    }

    #[test]
    fn rejects_drop() {
        assert!(validate_read_only("DROP TABLE t").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_read_only("").is_err());
        assert!(validate_read_only("   ").is_err());
    }

    #[test]
    fn is_case_insensitive() {
        assert!(validate_read_only("select 1").is_ok());
        assert!(validate_read_only("SeLeCt 1").is_ok());
    }
}
