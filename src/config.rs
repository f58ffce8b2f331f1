//! Plain, serde-backed tuning knobs for the stacking pipeline.
//!
//! There is no config-loading subsystem here (no file discovery, no env
//! overlay) — callers build an [`EngineConfig`] directly, or `Default::default()`
//! it and override the fields that matter for a given repository.

use serde::{Deserialize, Serialize};

/// Tuning knobs for partitioning, rebalancing, and feasibility resolution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on the number of file changes a single group (future commit) may own
    /// before the rebalance pass is required to split it.
    pub max_group_size: usize,
    /// Minimum fraction of a group's files that must move for a reassignment to be applied
    /// during rebalancing; prevents thrashing on marginal scores.
    pub reassign_threshold: f64,
    /// Minimum score advantage a candidate group must have over the incumbent before a file
    /// is moved to it.
    pub min_advantage: f64,
    /// Minimum number of historical co-changes two files must share before co-change
    /// affinity is allowed to pull them into the same group.
    pub cochange_floor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_group_size: 40,
            reassign_threshold: 0.25,
            min_advantage: 0.15,
            cochange_floor: 3,
        }
    }
}
