//! Worker topology discovery and per-node connection pools (spec.md §4.5).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use citus_db::{pool, PoolConfig};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tokio::sync::{RwLock, Semaphore};
use tracing::warn;

use crate::errors::ToolError;

/// One row of `pg_dist_node`. Identity is `node_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub is_coordinator: bool,
    pub is_active: bool,
    pub should_have_shards: bool,
}

/// A per-node connection pool, owned by [`WorkerManager`].
struct WorkerPool {
    node: NodeInfo,
    pool: PgPool,
}

/// Owns the coordinator pool's view of cluster topology plus one pool per
/// live worker node. Tools reference pools through this struct; they never
/// own one directly (spec.md §3 Ownership).
pub struct WorkerManager {
    coordinator: PgPool,
    workers: RwLock<HashMap<i32, WorkerPool>>,
    fan_out: Arc<Semaphore>,
    connect_timeout: Duration,
    statement_timeout_ms: u64,
}

impl WorkerManager {
    pub fn new(coordinator: PgPool, fan_out_concurrency: usize, connect_timeout: Duration, statement_timeout_ms: u64) -> Self {
        Self {
            coordinator,
            workers: RwLock::new(HashMap::new()),
            fan_out: Arc::new(Semaphore::new(fan_out_concurrency.max(1))),
            connect_timeout,
            statement_timeout_ms,
        }
    }

    /// `Topology() -> [NodeInfo]`, sourced from `pg_dist_node` (read-only).
    pub async fn topology(&self) -> Result<Vec<NodeInfo>, ToolError> {
        let rows = sqlx::query(
            "SELECT nodeid, nodename, nodeport, isactive, shouldhaveshards, noderole = 'primary' AND groupid = 0 AS is_coordinator \
             FROM pg_dist_node ORDER BY nodeid",
        )
        .fetch_all(&self.coordinator)
        .await
        .map_err(citus_db::DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| NodeInfo {
                node_id: row.get("nodeid"),
                host: row.get("nodename"),
                port: row.get("nodeport"),
                is_coordinator: row.get("is_coordinator"),
                is_active: row.get("isactive"),
                should_have_shards: row.get("shouldhaveshards"),
            })
            .collect())
    }

    /// Refresh worker pools against the current topology: open pools for new
    /// worker nodes, close pools for nodes no longer present.
    pub async fn refresh(&self) -> Result<Vec<NodeInfo>, ToolError> {
        let topology = self.topology().await?;
        let live_ids: std::collections::HashSet<i32> = topology
            .iter()
            .filter(|n| !n.is_coordinator)
            .map(|n| n.node_id)
            .collect();

        let mut workers = self.workers.write().await;
        workers.retain(|id, _| live_ids.contains(id));

        for node in topology.iter().filter(|n| !n.is_coordinator) {
            if workers.contains_key(&node.node_id) {
                continue;
            }
            let dsn = format!(
                "postgres://{}:{}/?application_name=citus-mcp-worker",
                node.host, node.port
            );
            let config = PoolConfig::new(dsn)
                .with_connect_timeout_secs(self.connect_timeout.as_secs())
                .with_statement_timeout_ms(self.statement_timeout_ms)
                .with_max_connections(2);
            match pool::create_pool(&config).await {
                Ok(p) => {
                    workers.insert(
                        node.node_id,
                        WorkerPool {
                            node: node.clone(),
                            pool: p,
                        },
                    );
                }
                Err(e) => warn!(node_id = node.node_id, error = %e, "failed to open worker pool"),
            }
        }

        Ok(topology)
    }

    /// `Pools() -> (map[node_id]WorkerPool, [NodeInfo])`.
    pub async fn pools(&self) -> (HashMap<i32, PgPool>, Vec<NodeInfo>) {
        let workers = self.workers.read().await;
        let pools = workers.iter().map(|(id, wp)| (*id, wp.pool.clone())).collect();
        let nodes = workers.values().map(|wp| wp.node.clone()).collect();
        (pools, nodes)
    }

    pub fn coordinator(&self) -> &PgPool {
        &self.coordinator
    }

    /// Reachability probe: a trivial query over the worker's pool, bounded by
    /// `timeout`. Unreachable workers are reported, never removed from
    /// topology (spec.md §4.5).
    pub async fn probe_reachable(&self, node_id: i32, timeout: Duration) -> bool {
        let pool = {
            let workers = self.workers.read().await;
            workers.get(&node_id).map(|wp| wp.pool.clone())
        };
        match pool {
            Some(p) => pool::probe(&p, timeout).await.is_ok(),
            None => false,
        }
    }

    /// Run `f` once per node in `node_ids`, at most `fan_out` concurrently,
    /// collecting results by node_id. Never exceeds the configured
    /// concurrency (spec.md §5 Bounded fan-out, §8 testable property).
    pub async fn fan_out<T, F, Fut>(&self, node_ids: &[i32], f: F) -> HashMap<i32, Result<T, ToolError>>
    where
        T: Send + 'static,
        F: Fn(i32, PgPool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ToolError>> + Send,
    {
        let (pools, _) = self.pools().await;
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(node_ids.len());
        for &node_id in node_ids {
            let Some(pool) = pools.get(&node_id).cloned() else {
                continue;
            };
            // Each task acquires its own permit once scheduled, so up to
            // `fan_out_concurrency` run concurrently and the rest queue
            // behind the semaphore rather than behind this loop.
            let semaphore = self.fan_out.clone();
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (node_id, f(node_id, pool).await)
            }));
        }
        let mut out = HashMap::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((node_id, result)) => {
                    out.insert(node_id, result);
                }
                Err(e) => warn!(error = %e, "fan-out task panicked"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_info_equality_is_structural() {
        let a = NodeInfo {
            node_id: 1,
            host: "h".into(),
            port: 5432,
            is_coordinator: false,
            is_active: true,
            should_have_shards: true,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
