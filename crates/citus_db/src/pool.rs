//! Postgres connection pool creation.
//!
//! One concrete pool type (`sqlx::PgPool`), not `sqlx::AnyPool`: Citus only
//! runs on Postgres, so there's no database-type switch to make at compile
//! time (contrast the teacher's sqlite/postgres feature flag, which existed
//! because its DB layer served several local-first backends).

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Executor, PgPool};
use tracing::info;

use crate::error::{DbError, Result};
use crate::redact::redact_dsn;

/// Parameters for building a pool against one Postgres endpoint (coordinator
/// or a single worker).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub dsn: String,
    pub application_name: String,
    pub statement_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

impl PoolConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            application_name: "citus-mcp".to_string(),
            statement_timeout_ms: 30_000,
            connect_timeout_secs: 5,
            max_connections: 5,
        }
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn with_statement_timeout_ms(mut self, ms: u64) -> Self {
        self.statement_timeout_ms = ms;
        self
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Build a pool against `config.dsn`. Every connection has its application
/// name and statement timeout set on checkout; the connect attempt itself is
/// bounded by `connect_timeout_secs`.
pub async fn create_pool(config: &PoolConfig) -> Result<PgPool> {
    let mut opts: PgConnectOptions = config
        .dsn
        .parse()
        .map_err(|e: sqlx::Error| DbError::InvalidDsn(redact_dsn(&e.to_string())))?;
    opts = opts
        .application_name(&config.application_name)
        .log_statements(tracing::log::LevelFilter::Debug);

    let statement_timeout_ms = config.statement_timeout_ms;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .after_connect(move |conn, _meta| {
            let stmt = format!("SET statement_timeout = {statement_timeout_ms}");
            Box::pin(async move {
                conn.execute(stmt.as_str()).await?;
                Ok(())
            })
        })
        .connect_with(opts)
        .await?;

    info!(
        dsn = %redact_dsn(&config.dsn),
        application_name = %config.application_name,
        "connected to postgres"
    );

    Ok(pool)
}

/// A lightweight reachability probe: run a trivial query over `pool` within
/// `timeout`. Used by the worker manager (citus_mcp) to test whether a
/// worker is currently reachable without removing it from the topology.
pub async fn probe(pool: &PgPool, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, pool.execute("SELECT 1"))
        .await
        .map_err(|_| DbError::Timeout)??;
    Ok(())
}
