//! Layered configuration loading (SPEC_FULL.md §3.1).
//!
//! Precedence, highest to lowest: CLI flags, `CITUS_MCP_*` environment
//! variables, a config file (first found of a fixed search list, parsed by
//! extension), then built-in defaults. Grounded on the teacher's
//! `casparian::ai::config` (`thiserror`-based `ConfigError`, `serde`
//! sections), generalized from a single TOML file to layered sources.

use std::path::{Path, PathBuf};

use citus_mcp::config::{Configuration, Mode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not parse {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no coordinator DSN given: pass --coordinator, set CITUS_MCP_COORDINATOR_DSN, or add coordinator_dsn to a config file")]
    MissingCoordinatorDsn,
}

/// A config file's contents: every field optional, since any field may
/// instead come from the environment or CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub coordinator_dsn: Option<String>,
    pub worker_dsns: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
    pub statement_timeout_ms: Option<u64>,
    pub application_name: Option<String>,
    pub mode: Option<Mode>,
    pub allow_execute: Option<bool>,
    pub approval_secret: Option<String>,
    pub max_rows: Option<usize>,
    pub max_text_bytes: Option<usize>,
    pub enable_caching: Option<bool>,
    pub cache_ttl_secs: Option<u64>,
    pub log_level: Option<String>,
    pub snapshot_advisor_collect_bytes: Option<bool>,
    pub fan_out_concurrency: Option<usize>,
    pub audit_log_path: Option<PathBuf>,
}

/// CLI-supplied overrides. Populated from `clap` flags in `main.rs`.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub coordinator_dsn: Option<String>,
    pub mode: Option<Mode>,
    pub allow_execute: Option<bool>,
    pub audit_log_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

/// Search order for a config file when `--config` isn't given.
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for ext in ["yaml", "yml", "json", "toml"] {
        paths.push(PathBuf::from(format!("citus-mcp.{ext}")));
    }
    for ext in ["yaml", "yml", "json", "toml"] {
        paths.push(PathBuf::from("config").join(format!("citus-mcp.{ext}")));
    }
    if let Some(xdg) = dirs::config_dir() {
        for ext in ["yaml", "yml", "json", "toml"] {
            paths.push(xdg.join("citus-mcp").join(format!("config.{ext}")));
        }
    }
    paths
}

fn parse_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(path) = explicit {
        return parse_config_file(path);
    }
    for candidate in default_search_paths() {
        if candidate.is_file() {
            return parse_config_file(&candidate);
        }
    }
    Ok(ConfigFile::default())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(format!("CITUS_MCP_{name}")).ok()
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

/// Everything the CLI resolves before building the server: the core
/// `Configuration` shared with `citus_mcp`, plus the audit log path, which
/// lives outside `Configuration` since it's a transport-layer concern, not
/// one the tool bodies ever read.
pub struct LoadedConfig {
    pub configuration: Configuration,
    pub audit_log_path: Option<PathBuf>,
}

/// Build the final `Configuration` by layering defaults, config file,
/// environment, then CLI overrides, each layer only filling in what the
/// previous one left unset.
pub fn load(overrides: CliOverrides) -> Result<LoadedConfig, ConfigError> {
    let file = load_config_file(overrides.config_path.as_deref())?;
    let mut config = Configuration::default();

    if let Some(v) = file.coordinator_dsn {
        config.coordinator_dsn = v;
    }
    if let Some(v) = file.worker_dsns {
        config.worker_dsns = v;
    }
    if let Some(v) = file.connect_timeout_secs {
        config.connect_timeout_secs = v;
    }
    if let Some(v) = file.statement_timeout_ms {
        config.statement_timeout_ms = v;
    }
    if let Some(v) = file.application_name {
        config.application_name = v;
    }
    if let Some(v) = file.mode {
        config.mode = v;
    }
    if let Some(v) = file.allow_execute {
        config.allow_execute = v;
    }
    if let Some(v) = file.approval_secret {
        config.approval_secret = v;
    }
    if let Some(v) = file.max_rows {
        config.max_rows = v;
    }
    if let Some(v) = file.max_text_bytes {
        config.max_text_bytes = v;
    }
    if let Some(v) = file.enable_caching {
        config.enable_caching = v;
    }
    if let Some(v) = file.cache_ttl_secs {
        config.cache_ttl_secs = v;
    }
    if let Some(v) = file.log_level {
        config.log_level = v;
    }
    if let Some(v) = file.snapshot_advisor_collect_bytes {
        config.snapshot_advisor_collect_bytes = v;
    }
    if let Some(v) = file.fan_out_concurrency {
        config.fan_out_concurrency = v;
    }
    let mut audit_log_path = file.audit_log_path;

    if let Some(v) = env_string("COORDINATOR_DSN") {
        config.coordinator_dsn = v;
    }
    if let Some(v) = env_string("WORKER_DSNS") {
        config.worker_dsns = v.split(',').map(str::trim).map(str::to_string).collect();
    }
    if let Some(v) = env_parsed::<u64>("CONNECT_TIMEOUT_SECS") {
        config.connect_timeout_secs = v;
    }
    if let Some(v) = env_parsed::<u64>("STATEMENT_TIMEOUT_MS") {
        config.statement_timeout_ms = v;
    }
    if let Some(v) = env_string("APPLICATION_NAME") {
        config.application_name = v;
    }
    if let Some(v) = env_string("MODE") {
        config.mode = match v.as_str() {
            "admin" => Mode::Admin,
            _ => Mode::ReadOnly,
        };
    }
    if let Some(v) = env_parsed::<bool>("ALLOW_EXECUTE") {
        config.allow_execute = v;
    }
    if let Some(v) = env_string("APPROVAL_SECRET") {
        config.approval_secret = v;
    }
    if let Some(v) = env_parsed::<usize>("MAX_ROWS") {
        config.max_rows = v;
    }
    if let Some(v) = env_parsed::<usize>("MAX_TEXT_BYTES") {
        config.max_text_bytes = v;
    }
    if let Some(v) = env_parsed::<bool>("ENABLE_CACHING") {
        config.enable_caching = v;
    }
    if let Some(v) = env_parsed::<u64>("CACHE_TTL_SECS") {
        config.cache_ttl_secs = v;
    }
    if let Some(v) = env_string("LOG_LEVEL") {
        config.log_level = v;
    }
    if let Some(v) = env_string("AUDIT_LOG_PATH") {
        audit_log_path = Some(PathBuf::from(v));
    }

    if let Some(v) = overrides.coordinator_dsn {
        config.coordinator_dsn = v;
    }
    if let Some(v) = overrides.mode {
        config.mode = v;
    }
    if let Some(v) = overrides.allow_execute {
        config.allow_execute = v;
    }
    if let Some(v) = overrides.audit_log_path {
        audit_log_path = Some(v);
    }

    if config.coordinator_dsn.is_empty() {
        return Err(ConfigError::MissingCoordinatorDsn);
    }

    Ok(LoadedConfig {
        configuration: config,
        audit_log_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dsn_everywhere_is_an_error() {
        let err = load(CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCoordinatorDsn));
    }

    #[test]
    fn cli_override_wins_over_everything_else() {
        std::env::set_var("CITUS_MCP_COORDINATOR_DSN", "postgres://env/db");
        let loaded = load(CliOverrides {
            coordinator_dsn: Some("postgres://cli/db".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(loaded.configuration.coordinator_dsn, "postgres://cli/db");
        std::env::remove_var("CITUS_MCP_COORDINATOR_DSN");
    }

    #[test]
    fn env_wins_over_config_file_default() {
        std::env::set_var("CITUS_MCP_COORDINATOR_DSN", "postgres://env/db");
        let loaded = load(CliOverrides::default()).unwrap();
        assert_eq!(loaded.configuration.coordinator_dsn, "postgres://env/db");
        std::env::remove_var("CITUS_MCP_COORDINATOR_DSN");
    }
}
