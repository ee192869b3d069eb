//! Optional NDJSON audit trail of dispatched tool calls (SPEC_FULL.md §4.11).
//! Off by default; when a path is configured, one line is appended per
//! `tools/call` dispatch.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::SecurityError;

pub struct AuditLog {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SecurityError::Audit(format!("create {}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SecurityError::Audit(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one line for a dispatched tool call. Arguments are summarized
    /// to field names rather than echoed verbatim, since this log is about
    /// who called what, not a data-access transcript. A write failure here
    /// is a warning, not a tool-call failure.
    pub fn log_tool_call(&self, tool: &str, arguments: &Value, duration_ms: u64, error_code: Option<&str>) {
        let entry = Entry {
            ts: Utc::now().to_rfc3339(),
            tool: tool.to_string(),
            argument_keys: summarize_keys(arguments),
            duration_ms,
            error_code: error_code.map(str::to_string),
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

fn summarize_keys(arguments: &Value) -> Vec<String> {
    match arguments {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Serialize)]
struct Entry {
    ts: String,
    tool: String,
    argument_keys: Vec<String>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_one_line_per_call() {
        let dir = std::env::temp_dir().join(format!("citus-mcp-audit-test-{}", std::process::id()));
        let path = dir.join("audit.ndjson");
        let log = AuditLog::new(&path).unwrap();
        log.log_tool_call("ping", &serde_json::json!({}), 5, None);
        log.log_tool_call("citus_rebalance_execute", &serde_json::json!({"strategy": "hybrid"}), 120, Some("approval_required"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("approval_required"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn summarizes_object_keys_only() {
        assert_eq!(
            summarize_keys(&serde_json::json!({"a": 1, "b": 2})).len(),
            2
        );
        assert!(summarize_keys(&serde_json::json!([1, 2, 3])).is_empty());
    }
}
