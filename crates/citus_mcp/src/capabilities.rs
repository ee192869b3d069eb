//! Runtime capability probing (spec.md §4.6): check for the presence of
//! named catalog functions via `to_regproc` so dependent code can fall back
//! gracefully instead of failing hard on an older Citus version.

use std::collections::HashMap;

use sqlx::{PgPool, Row};
use tracing::warn;

/// Function names probed at startup. `citus_shard_sizes` backs the
/// aggregate-bytes fast path in the snapshot advisor (spec.md §4.8 step 4).
pub const CITUS_SHARD_SIZES: &str = "citus_shard_sizes";
pub const CITUS_TOTAL_RELATION_SIZE: &str = "citus_total_relation_size";
pub const CITUS_RELATION_SIZE: &str = "citus_relation_size";

const PROBED_FUNCTIONS: &[&str] = &[
    CITUS_SHARD_SIZES,
    CITUS_TOTAL_RELATION_SIZE,
    CITUS_RELATION_SIZE,
];

#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    present: HashMap<String, bool>,
}

impl Capabilities {
    pub fn has(&self, function_name: &str) -> bool {
        self.present.get(function_name).copied().unwrap_or(false)
    }

    /// Probe the cluster for `PROBED_FUNCTIONS`. A probing failure is a
    /// warning, not fatal: the flag is left `false` and callers fall back.
    pub async fn probe(coordinator: &PgPool) -> Self {
        let mut present = HashMap::new();
        for name in PROBED_FUNCTIONS {
            match sqlx::query("SELECT to_regproc($1) IS NOT NULL AS present")
                .bind(name)
                .fetch_one(coordinator)
                .await
            {
                Ok(row) => {
                    present.insert((*name).to_string(), row.get::<bool, _>("present"));
                }
                Err(e) => {
                    warn!(function = name, error = %e, "capability probe failed");
                    present.insert((*name).to_string(), false);
                }
            }
        }
        Self { present }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_function_reports_absent() {
        let caps = Capabilities::default();
        assert!(!caps.has(CITUS_SHARD_SIZES));
    }

    #[test]
    fn known_present_function_reports_true() {
        let mut caps = Capabilities::default();
        caps.present.insert(CITUS_SHARD_SIZES.to_string(), true);
        assert!(caps.has(CITUS_SHARD_SIZES));
    }
}
