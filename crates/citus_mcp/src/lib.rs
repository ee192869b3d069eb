//! MCP server exposing operational tooling for a distributed PostgreSQL /
//! Citus cluster (spec.md §1).
//!
//! # Architecture
//!
//! ```text
//! stdio JSON-RPC  ->  server::Server  ->  tools::ToolRegistry  ->  citus_db pools
//!                         |
//!                         +-- guardrails (approval tokens, read-only SQL)
//!                         +-- worker_manager (topology, bounded fan-out)
//!                         +-- cache (TTL + single-flight)
//!                         +-- snapshot_advisor (C8 scoring pipeline)
//! ```
//!
//! Every tool body returns `Result<Value, errors::ToolError>`; `server`
//! turns that into the MCP tool-call envelope. No caller-supplied string is
//! interpolated into SQL except through `citus_db::identifier` quoting.

pub mod cache;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod guardrails;
pub mod protocol;
pub mod redaction;
pub mod security;
pub mod server;
pub mod snapshot_advisor;
pub mod tokens;
pub mod tools;
pub mod types;
pub mod worker_manager;

pub use cache::ResultCache;
pub use capabilities::Capabilities;
pub use config::{Configuration, Mode};
pub use errors::{ErrorKind, ToolError};
pub use guardrails::Guardrails;
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use security::{AuditLog, OutputBudget};
pub use server::{Server, ServerConfig};
pub use tokens::{ApprovalToken, TokenAuthority};
pub use tools::{ToolContext, ToolRegistry};
pub use worker_manager::{NodeInfo, WorkerManager};
