//! Coordinator/worker Postgres pooling, SQL guard, DSN redaction and
//! identifier quoting for citus-mcp.
//!
//! This crate has no knowledge of MCP, tools, or Citus catalogs. It gives
//! `citus_mcp` three things it needs to talk to a cluster safely: a way to
//! open a pool, a way to classify a statement as read-only, and a way to
//! keep a credential out of a log line.

pub mod error;
pub mod identifier;
pub mod pool;
pub mod redact;
pub mod sql_guard;

pub use error::{DbError, Result};
pub use identifier::{quote_ident, quote_qualified};
pub use pool::{create_pool, probe, PoolConfig};
pub use redact::redact_dsn;
pub use sql_guard::{validate_read_only, SqlGuardError};
