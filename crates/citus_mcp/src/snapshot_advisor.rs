//! Snapshot source advisor (spec.md §4.8): collects per-worker shard/byte
//! metrics, simulates splitting each worker into two, scores the resulting
//! skew reduction, and ranks candidates for which worker to snapshot a new
//! node from when scaling the cluster.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::cache::ResultCache;
use crate::capabilities::{Capabilities, CITUS_SHARD_SIZES};
use crate::config::Configuration;
use crate::errors::ToolError;
use crate::worker_manager::{NodeInfo, WorkerManager};

const BYTES_CACHE_KEY: &str = "snapshotadvisor:bytes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ByShardCount,
    ByDiskSize,
    Hybrid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotAdvisorInput {
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub exclude_nodes: Vec<String>,
    #[serde(default)]
    pub require_reachable: bool,
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone)]
struct WorkerMetrics {
    node: NodeInfo,
    shard_count: i64,
    bytes: Option<i64>,
    reachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterMetricsBefore {
    pub worker_count: usize,
    pub total_shards: i64,
    pub total_bytes: Option<i64>,
    pub skew_ratio_shards: f64,
    pub skew_ratio_bytes: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdealTargetAfterAddition {
    pub worker_count_after: usize,
    pub target_shards_per_worker: f64,
    pub target_bytes_per_worker: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictedAfter {
    pub skew_ratio_shards: f64,
    pub skew_ratio_bytes: Option<f64>,
    pub max_deviation_shards: f64,
    pub max_deviation_bytes: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub source: NodeInfo,
    pub score: f64,
    pub predicted_after: PredictedAfter,
    pub why: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotAdvisorOutput {
    pub before: ClusterMetricsBefore,
    pub ideal: IdealTargetAfterAddition,
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<String>,
    pub next_steps: Vec<String>,
}

/// Step 1-2: collect topology, apply `exclude_nodes`/`require_reachable`.
///
/// Reachability is probed for every surviving node regardless of
/// `require_reachable` — when the flag is set, an unreachable node is
/// dropped here; when it isn't, the probe result is carried forward as
/// `WorkerMetrics::reachable` for the ranking tie-break in `run()`.
async fn collect_and_filter(
    workers: &WorkerManager,
    input: &SnapshotAdvisorInput,
    warnings: &mut Vec<String>,
) -> Result<Vec<(NodeInfo, bool)>, ToolError> {
    let (_, nodes) = workers.pools().await;
    if nodes.is_empty() {
        return Err(ToolError::invalid_input("no worker nodes in topology"));
    }

    let excluded: std::collections::HashSet<String> = input.exclude_nodes.iter().cloned().collect();
    let mut kept = Vec::new();
    for node in nodes {
        let host_port = format!("{}:{}", node.host, node.port);
        if excluded.contains(&host_port) {
            continue;
        }
        let reachable = workers
            .probe_reachable(node.node_id, Duration::from_secs(2))
            .await;
        if input.require_reachable && !reachable {
            warnings.push(format!(
                "node {} ({}) skipped: unreachable",
                node.node_id, host_port
            ));
            continue;
        }
        kept.push((node, reachable));
    }
    Ok(kept)
}

/// Step 3: shard counts from a single coordinator query joining placement to
/// node catalog, grouped by node_id. Missing node -> 0.
async fn shard_counts(
    workers: &WorkerManager,
    nodes: &[NodeInfo],
) -> Result<HashMap<i32, i64>, ToolError> {
    let rows = sqlx::query(
        "SELECT pn.nodeid AS node_id, count(ps.shardid) AS shard_count \
         FROM pg_dist_node pn \
         LEFT JOIN pg_dist_placement pp ON pp.groupid = pn.groupid \
         LEFT JOIN pg_dist_shard ps ON ps.shardid = pp.shardid \
         WHERE pn.isactive AND pn.shouldhaveshards \
         GROUP BY pn.nodeid",
    )
    .fetch_all(workers.coordinator())
    .await
    .map_err(citus_db::DbError::from)?;

    let mut counts: HashMap<i32, i64> = rows
        .into_iter()
        .map(|row| (row.get::<i32, _>("node_id"), row.get::<i64, _>("shard_count")))
        .collect();
    for node in nodes {
        counts.entry(node.node_id).or_insert(0);
    }
    Ok(counts)
}

/// Step 4: best-effort byte collection. Cache-backed; prefers the cluster
/// aggregate function when the capability flag is set, else fans out to
/// workers (bounded concurrency via `WorkerManager::fan_out`).
async fn collect_bytes(
    workers: &WorkerManager,
    nodes: &[NodeInfo],
    capabilities: &Capabilities,
    cache: Option<&ResultCache>,
    cache_ttl: Duration,
    warnings: &mut Vec<String>,
) -> Option<HashMap<i32, i64>> {
    if let Some(cache) = cache {
        if let Some(cached) = cache.get(BYTES_CACHE_KEY).await {
            if let Ok(map) = serde_json::from_value::<HashMap<i32, i64>>(cached) {
                return Some(map);
            }
        }
    }

    let result = if capabilities.has(CITUS_SHARD_SIZES) {
        collect_bytes_via_aggregate(workers, warnings).await
    } else {
        collect_bytes_via_fan_out(workers, nodes, warnings).await
    };

    match result {
        Some(map) => {
            if let Some(cache) = cache {
                if let Ok(value) = serde_json::to_value(&map) {
                    cache.set(BYTES_CACHE_KEY, value, cache_ttl).await;
                }
            }
            Some(map)
        }
        None => None,
    }
}

async fn collect_bytes_via_aggregate(
    workers: &WorkerManager,
    warnings: &mut Vec<String>,
) -> Option<HashMap<i32, i64>> {
    let rows = match sqlx::query(
        "SELECT pn.nodeid AS node_id, coalesce(sum(s.shard_size), 0) AS bytes \
         FROM pg_dist_node pn \
         LEFT JOIN citus_shard_sizes() s ON true \
         LEFT JOIN pg_dist_placement pp ON pp.shardid = s.shard_id AND pp.groupid = pn.groupid \
         WHERE pn.isactive AND pn.shouldhaveshards \
         GROUP BY pn.nodeid",
    )
    .fetch_all(workers.coordinator())
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warnings.push(format!("citus_shard_sizes() query failed: {e}"));
            return None;
        }
    };

    Some(
        rows.into_iter()
            .map(|row| (row.get::<i32, _>("node_id"), row.get::<i64, _>("bytes")))
            .collect(),
    )
}

async fn collect_bytes_via_fan_out(
    workers: &WorkerManager,
    nodes: &[NodeInfo],
    warnings: &mut Vec<String>,
) -> Option<HashMap<i32, i64>> {
    let node_ids: Vec<i32> = nodes.iter().map(|n| n.node_id).collect();
    let results = workers
        .fan_out(&node_ids, |_node_id, pool| async move {
            let row = sqlx::query(
                "SELECT coalesce(sum(pg_total_relation_size(c.oid)), 0) AS bytes \
                 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE c.relkind IN ('r', 'm') \
                 AND n.nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast', 'citus')",
            )
            .fetch_one(&pool)
            .await
            .map_err(citus_db::DbError::from)?;
            Ok::<i64, ToolError>(row.get("bytes"))
        })
        .await;

    if results.is_empty() {
        warnings.push("bytes not available; using shard_count for scoring".to_string());
        return None;
    }

    let mut map = HashMap::with_capacity(results.len());
    let mut any_failure = false;
    for (node_id, result) in results {
        match result {
            Ok(bytes) => {
                map.insert(node_id, bytes);
            }
            Err(e) => {
                any_failure = true;
                warnings.push(format!("node {node_id}: byte collection failed: {e}"));
            }
        }
    }

    if any_failure && map.is_empty() {
        warnings.push("bytes not available; using shard_count for scoring".to_string());
        return None;
    }
    Some(map)
}

/// max/min over strictly positive values; 0.0 if fewer than one positive
/// value is present ("no skew measurable", spec.md §4.8 edge cases).
fn skew_ratio(values: impl Iterator<Item = f64>) -> f64 {
    let positives: Vec<f64> = values.filter(|v| *v > 0.0).collect();
    if positives.is_empty() {
        return 0.0;
    }
    let max = positives.iter().cloned().fold(f64::MIN, f64::max);
    let min = positives.iter().cloned().fold(f64::MAX, f64::min);
    if min <= 0.0 {
        0.0
    } else {
        max / min
    }
}

fn max_deviation(values: &[f64], target: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - target).abs())
        .fold(0.0, f64::max)
}

fn component_score(before: f64, after: f64, before_dev: f64, after_dev: f64) -> f64 {
    let skew_term = if before > 0.0 {
        (0.7 * ((before - after) / before).max(0.0)).min(0.7)
    } else {
        0.0
    };
    let dev_term = if before_dev > 0.0 {
        (0.3 * ((before_dev - after_dev) / before_dev).max(0.0)).min(0.3)
    } else {
        0.0
    };
    ((skew_term + dev_term) * 100.0).clamp(0.0, 100.0)
}

/// Run the full pipeline (spec.md §4.8 steps 1-10).
pub async fn run(
    workers: &WorkerManager,
    config: &Configuration,
    capabilities: &Capabilities,
    cache: Option<&ResultCache>,
    input: SnapshotAdvisorInput,
) -> Result<SnapshotAdvisorOutput, ToolError> {
    let mut warnings = Vec::new();

    let kept = collect_and_filter(workers, &input, &mut warnings).await?;
    if kept.is_empty() {
        return Ok(SnapshotAdvisorOutput {
            before: ClusterMetricsBefore {
                worker_count: 0,
                total_shards: 0,
                total_bytes: None,
                skew_ratio_shards: 0.0,
                skew_ratio_bytes: None,
            },
            ideal: IdealTargetAfterAddition {
                worker_count_after: 1,
                target_shards_per_worker: 0.0,
                target_bytes_per_worker: None,
            },
            candidates: Vec::new(),
            warnings: {
                warnings.push("all workers unreachable or excluded".to_string());
                warnings
            },
            next_steps: next_steps(),
        });
    }

    let nodes: Vec<NodeInfo> = kept.iter().map(|(node, _)| node.clone()).collect();
    let reachable_by_node: HashMap<i32, bool> =
        kept.iter().map(|(node, reachable)| (node.node_id, *reachable)).collect();

    let counts = shard_counts(workers, &nodes).await?;

    let bytes = if config.snapshot_advisor_collect_bytes {
        collect_bytes(
            workers,
            &nodes,
            capabilities,
            cache,
            Duration::from_secs(config.cache_ttl_secs),
            &mut warnings,
        )
        .await
    } else {
        None
    };

    let metrics: Vec<WorkerMetrics> = nodes
        .iter()
        .map(|node| WorkerMetrics {
            node: node.clone(),
            shard_count: *counts.get(&node.node_id).unwrap_or(&0),
            bytes: bytes.as_ref().and_then(|m| m.get(&node.node_id).copied()),
            reachable: *reachable_by_node.get(&node.node_id).unwrap_or(&false),
        })
        .collect();

    let total_shards: i64 = metrics.iter().map(|m| m.shard_count).sum();
    let total_bytes: Option<i64> = bytes
        .as_ref()
        .map(|_| metrics.iter().filter_map(|m| m.bytes).sum());
    let skew_ratio_shards = skew_ratio(metrics.iter().map(|m| m.shard_count as f64));
    let skew_ratio_bytes = total_bytes
        .map(|_| skew_ratio(metrics.iter().filter_map(|m| m.bytes).map(|b| b as f64)));

    let before = ClusterMetricsBefore {
        worker_count: metrics.len(),
        total_shards,
        total_bytes,
        skew_ratio_shards,
        skew_ratio_bytes,
    };

    let worker_count_after = metrics.len() + 1;
    let ideal = IdealTargetAfterAddition {
        worker_count_after,
        target_shards_per_worker: total_shards as f64 / worker_count_after as f64,
        target_bytes_per_worker: total_bytes.map(|b| b as f64 / worker_count_after as f64),
    };

    let strategy = input.strategy.unwrap_or(Strategy::Hybrid);
    let mut candidates = Vec::with_capacity(metrics.len());

    for (i, worker) in metrics.iter().enumerate() {
        let mut simulated_shards: Vec<f64> = metrics.iter().map(|m| m.shard_count as f64).collect();
        let half = (worker.shard_count as f64 / 2.0).round();
        simulated_shards[i] = worker.shard_count as f64 - half;
        simulated_shards.push(half);

        let after_skew_shards = skew_ratio(simulated_shards.iter().copied());
        let after_dev_shards = max_deviation(&simulated_shards, ideal.target_shards_per_worker);
        let before_dev_shards = max_deviation(
            &metrics.iter().map(|m| m.shard_count as f64).collect::<Vec<_>>(),
            ideal.target_shards_per_worker,
        );
        let shard_score = component_score(
            skew_ratio_shards,
            after_skew_shards,
            before_dev_shards,
            after_dev_shards,
        );

        let (bytes_score, after_skew_bytes, after_dev_bytes) = match (worker.bytes, &total_bytes) {
            (Some(worker_bytes), Some(_)) if skew_ratio_bytes.is_some() => {
                let mut simulated_bytes: Vec<f64> =
                    metrics.iter().map(|m| m.bytes.unwrap_or(0) as f64).collect();
                let half_bytes = (worker_bytes as f64 / 2.0).round();
                simulated_bytes[i] = worker_bytes as f64 - half_bytes;
                simulated_bytes.push(half_bytes);

                let after_skew = skew_ratio(simulated_bytes.iter().copied());
                let target_bytes = ideal.target_bytes_per_worker.unwrap_or(0.0);
                let after_dev = max_deviation(&simulated_bytes, target_bytes);
                let before_dev = max_deviation(
                    &metrics.iter().map(|m| m.bytes.unwrap_or(0) as f64).collect::<Vec<_>>(),
                    target_bytes,
                );
                let score = component_score(
                    skew_ratio_bytes.unwrap_or(0.0),
                    after_skew,
                    before_dev,
                    after_dev,
                );
                (Some(score), Some(after_skew), Some(after_dev))
            }
            _ => (None, None, None),
        };

        let score = match strategy {
            Strategy::ByShardCount => shard_score,
            Strategy::ByDiskSize => bytes_score.unwrap_or(shard_score),
            Strategy::Hybrid => match bytes_score {
                Some(b) => 0.6 * b + 0.4 * shard_score,
                None => shard_score,
            },
        }
        .clamp(0.0, 100.0);

        let mut why = vec![format!(
            "worker {} holds {} shards; splitting it drops shard skew from {:.2} to {:.2}",
            worker.node.node_id, worker.shard_count, skew_ratio_shards, after_skew_shards
        )];
        if let Some(after_skew_bytes) = after_skew_bytes {
            why.push(format!(
                "byte skew would move from {:.2} to {:.2}",
                skew_ratio_bytes.unwrap_or(0.0),
                after_skew_bytes
            ));
        }
        why.push(format!(
            "predicted max shard-count deviation from target after split: {:.1}",
            after_dev_shards
        ));
        why.push(
            "workflow: snapshot this worker to the new node, then run citus_rebalance_plan"
                .to_string(),
        );

        candidates.push(Candidate {
            source: worker.node.clone(),
            score,
            predicted_after: PredictedAfter {
                skew_ratio_shards: after_skew_shards,
                skew_ratio_bytes: after_skew_bytes,
                max_deviation_shards: after_dev_shards,
                max_deviation_bytes: after_dev_bytes,
            },
            why,
        });
    }

    // Step 8: rank by score desc, reachable > unreachable, should_have_shards
    // > not, host asc, port asc, node_id asc. Unreachable workers are only
    // dropped up front when `require_reachable` is set, so the reachable
    // tie-break still matters for the default (non-filtering) run.
    candidates.sort_by(|a, b| {
        let a_reachable = reachable_by_node.get(&a.source.node_id).copied().unwrap_or(false);
        let b_reachable = reachable_by_node.get(&b.source.node_id).copied().unwrap_or(false);
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b_reachable.cmp(&a_reachable))
            .then_with(|| b.source.should_have_shards.cmp(&a.source.should_have_shards))
            .then_with(|| a.source.host.cmp(&b.source.host))
            .then_with(|| a.source.port.cmp(&b.source.port))
            .then_with(|| a.source.node_id.cmp(&b.source.node_id))
    });

    if let Some(max) = input.max_candidates {
        if max > 0 {
            candidates.truncate(max);
        }
    }

    if bytes.is_none() && !warnings.iter().any(|w| w.contains("bytes not available")) {
        warnings.push("bytes not available; using shard_count for scoring".to_string());
    }

    Ok(SnapshotAdvisorOutput {
        before,
        ideal,
        candidates,
        warnings,
        next_steps: next_steps(),
    })
}

fn next_steps() -> Vec<String> {
    vec![
        "citus_node_prepare_advisor".to_string(),
        "citus_rebalance_plan".to_string(),
        "citus_rebalance_execute".to_string(),
        "citus_rebalance_status".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_ratio_of_10_6_4_is_2_5() {
        let ratio = skew_ratio([10.0, 6.0, 4.0].into_iter());
        assert!((ratio - 2.5).abs() < 1e-9);
    }

    #[test]
    fn skew_ratio_with_no_positive_values_is_zero() {
        assert_eq!(skew_ratio([0.0, 0.0].into_iter()), 0.0);
    }

    #[test]
    fn simulated_split_of_10_6_at_index_0_yields_6_over_5() {
        let mut simulated = vec![10.0, 6.0];
        let half = (10.0_f64 / 2.0).round();
        simulated[0] = 10.0 - half;
        simulated.push(half);
        assert_eq!(simulated, vec![5.0, 6.0, 5.0]);
        let ratio = skew_ratio(simulated.into_iter());
        assert!((ratio - 1.2).abs() < 1e-9);
    }

    #[test]
    fn component_score_is_bounded_0_to_100() {
        let score = component_score(2.5, 1.2, 4.0, 1.0);
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn component_score_with_zero_before_is_zero() {
        assert_eq!(component_score(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    fn node(id: i32, host: &str, port: i32, reachable: bool) -> NodeInfo {
        NodeInfo {
            node_id: id,
            host: host.to_string(),
            port,
            is_coordinator: false,
            is_active: reachable,
            should_have_shards: true,
        }
    }

    #[test]
    fn ranking_tie_break_orders_by_host_then_truncates() {
        let mut candidates = vec![
            Candidate {
                source: node(2, "b", 1, true),
                score: 50.0,
                predicted_after: PredictedAfter {
                    skew_ratio_shards: 0.0,
                    skew_ratio_bytes: None,
                    max_deviation_shards: 0.0,
                    max_deviation_bytes: None,
                },
                why: vec![],
            },
            Candidate {
                source: node(1, "a", 1, true),
                score: 50.0,
                predicted_after: PredictedAfter {
                    skew_ratio_shards: 0.0,
                    skew_ratio_bytes: None,
                    max_deviation_shards: 0.0,
                    max_deviation_bytes: None,
                },
                why: vec![],
            },
            Candidate {
                source: node(3, "c", 1, true),
                score: 60.0,
                predicted_after: PredictedAfter {
                    skew_ratio_shards: 0.0,
                    skew_ratio_bytes: None,
                    max_deviation_shards: 0.0,
                    max_deviation_bytes: None,
                },
                why: vec![],
            },
        ];
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| a.source.host.cmp(&b.source.host))
        });
        candidates.truncate(2);
        let hosts: Vec<&str> = candidates.iter().map(|c| c.source.host.as_str()).collect();
        assert_eq!(hosts, vec!["c", "a"]);
    }

    #[test]
    fn ranking_prefers_reachable_worker_on_tied_score() {
        let mut candidates = vec![
            Candidate {
                source: node(1, "a", 1, false),
                score: 50.0,
                predicted_after: PredictedAfter {
                    skew_ratio_shards: 0.0,
                    skew_ratio_bytes: None,
                    max_deviation_shards: 0.0,
                    max_deviation_bytes: None,
                },
                why: vec![],
            },
            Candidate {
                source: node(2, "b", 1, true),
                score: 50.0,
                predicted_after: PredictedAfter {
                    skew_ratio_shards: 0.0,
                    skew_ratio_bytes: None,
                    max_deviation_shards: 0.0,
                    max_deviation_bytes: None,
                },
                why: vec![],
            },
        ];
        let reachable_by_node: HashMap<i32, bool> = [(1, false), (2, true)].into_iter().collect();

        candidates.sort_by(|a, b| {
            let a_reachable = reachable_by_node.get(&a.source.node_id).copied().unwrap_or(false);
            let b_reachable = reachable_by_node.get(&b.source.node_id).copied().unwrap_or(false);
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then_with(|| b_reachable.cmp(&a_reachable))
        });

        assert_eq!(candidates[0].source.node_id, 2);
    }
}
