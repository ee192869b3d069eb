//! Server configuration (spec.md §3 Configuration, SPEC_FULL.md §3.1).
//!
//! Loaded once at startup by `citus_mcp_cli` and threaded as an immutable
//! value into every dependency struct — never a package-level global
//! (spec.md §9 "Global state").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    ReadOnly,
    Admin,
}

impl Default for Mode {
    fn default() -> Self {
        Self::ReadOnly
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub coordinator_dsn: String,
    pub worker_dsns: Vec<String>,
    pub connect_timeout_secs: u64,
    pub statement_timeout_ms: u64,
    pub application_name: String,
    pub mode: Mode,
    pub allow_execute: bool,
    pub approval_secret: String,
    pub max_rows: usize,
    pub max_text_bytes: usize,
    pub enable_caching: bool,
    pub cache_ttl_secs: u64,
    pub log_level: String,
    pub snapshot_advisor_collect_bytes: bool,
    pub fan_out_concurrency: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            coordinator_dsn: String::new(),
            worker_dsns: Vec::new(),
            connect_timeout_secs: 5,
            statement_timeout_ms: 30_000,
            application_name: "citus-mcp".to_string(),
            mode: Mode::ReadOnly,
            allow_execute: false,
            approval_secret: String::new(),
            max_rows: 10_000,
            max_text_bytes: 8192,
            enable_caching: true,
            cache_ttl_secs: 30,
            log_level: "info".to_string(),
            snapshot_advisor_collect_bytes: true,
            fan_out_concurrency: 4,
        }
    }
}

impl Configuration {
    pub fn is_execute_allowed(&self) -> bool {
        self.mode == Mode::Admin && self.allow_execute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_read_only_and_execute_disabled() {
        let config = Configuration::default();
        assert_eq!(config.mode, Mode::ReadOnly);
        assert!(!config.is_execute_allowed());
    }

    #[test]
    fn execute_requires_both_admin_mode_and_allow_execute_flag() {
        let mut config = Configuration {
            mode: Mode::Admin,
            allow_execute: false,
            ..Configuration::default()
        };
        assert!(!config.is_execute_allowed());
        config.allow_execute = true;
        assert!(config.is_execute_allowed());
    }

    #[test]
    fn default_fan_out_concurrency_is_four() {
        assert_eq!(Configuration::default().fan_out_concurrency, 4);
    }
}
