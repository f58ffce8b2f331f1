//! C4 — Partitioner: assigns every touched path to exactly one group, seeded from caller-supplied
//! hints and filled in by a weighted scoring function over import/directory/symbol/co-change
//! signals plus a same-layer bonus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::stacking::errors::StackingError;
use crate::stacking::group::{ScoringContext, classify_layer, dominant_layer};
use crate::stacking::model::{Delta, Group, GroupType, HintGroup, Ownership, SymbolIndex};

const WEIGHT_IMPORT: f64 = 0.40;
const WEIGHT_DIR: f64 = 0.30;
const WEIGHT_SYMBOL: f64 = 0.20;
const WEIGHT_COCHANGE: f64 = 0.10;
const LAYER_BONUS_SAME: f64 = 0.30;
const LAYER_BONUS_ADJACENT: f64 = 0.10;

/// Every path touched by any delta, in deterministic order.
fn touched_paths(deltas: &[Delta]) -> BTreeSet<PathBuf> {
    let mut paths = BTreeSet::new();
    for delta in deltas {
        for change in &delta.changes {
            paths.insert(change.path.clone());
            if let Some(old) = &change.old_path {
                paths.insert(old.clone());
            }
        }
    }
    paths
}

/// Number of leading path components shared between `a` and `b`.
fn shared_prefix_len(a: &Path, b: &Path) -> usize {
    a.components().zip(b.components()).take_while(|(x, y)| x == y).count()
}

/// Capped sum of `min(1, |shared_names|/3)` over import edges in either direction between `path`
/// and `group`'s files: edges where `path` imports from a file in `group`, and edges where a file
/// in `group` imports from `path`.
pub(crate) fn s_import(path: &Path, group: &Group, symbol_index: &SymbolIndex) -> f64 {
    let mut total = 0.0;
    if let Some(symbols) = symbol_index.get(path) {
        for edge in &symbols.imports {
            if group.files.contains(&edge.from_path) {
                total += (edge.names.len() as f64 / 3.0).min(1.0);
            }
        }
    }
    for other_path in &group.files {
        if let Some(other_symbols) = symbol_index.get(other_path) {
            for edge in &other_symbols.imports {
                if edge.from_path == *path {
                    total += (edge.names.len() as f64 / 3.0).min(1.0);
                }
            }
        }
    }
    total.min(1.0)
}

/// Longest shared directory prefix length between `path` and any of `group`'s files, divided by 4
/// and capped at 1.
fn s_dir(path: &Path, group: &Group) -> f64 {
    let longest = group.files.iter().map(|f| shared_prefix_len(path, f)).max().unwrap_or(0);
    (longest as f64 / 4.0).min(1.0)
}

/// Count of exported-name matches across either direction (path's exports consumed by group's
/// imports, or group's exports consumed by path's imports), divided by 5 and capped at 1.
fn s_symbol(path: &Path, group: &Group, symbol_index: &SymbolIndex) -> f64 {
    let mut matches = 0usize;
    if let Some(symbols) = symbol_index.get(path) {
        if !symbols.exports.is_empty() {
            for other_path in &group.files {
                if let Some(other_symbols) = symbol_index.get(other_path) {
                    for edge in &other_symbols.imports {
                        if edge.from_path == *path {
                            matches += edge.names.intersection(&symbols.exports).count();
                        }
                    }
                }
            }
        }
        for edge in &symbols.imports {
            if let Some(other_symbols) = symbol_index.get(&edge.from_path) {
                if group.files.contains(&edge.from_path) {
                    matches += edge.names.intersection(&other_symbols.exports).count();
                }
            }
        }
    }
    (matches as f64 / 5.0).min(1.0)
}

fn s_cochange(path: &Path, group: &Group, ctx: &ScoringContext) -> f64 {
    if ctx.total_commits == 0 {
        return 0.0;
    }
    let total: u32 = group
        .files
        .iter()
        .map(|f| ctx.cochange_count(path, f))
        .sum();
    (total as f64 / (0.5 * ctx.total_commits as f64)).min(1.0)
}

/// Combined affinity of `path` for `group`, in `[0, 1 + LAYER_BONUS_SAME]`.
pub(crate) fn score(path: &Path, group: &Group, ctx: &ScoringContext) -> f64 {
    let mut total = WEIGHT_IMPORT * s_import(path, group, ctx.symbol_index)
        + WEIGHT_DIR * s_dir(path, group)
        + WEIGHT_SYMBOL * s_symbol(path, group, ctx.symbol_index)
        + WEIGHT_COCHANGE * s_cochange(path, group, ctx);

    if !group.files.is_empty() {
        let path_layer = classify_layer(path, ctx.symbol_index.get(path));
        let group_layer = dominant_layer(group, ctx.symbol_index);
        if path_layer == group_layer {
            total += LAYER_BONUS_SAME;
        } else if path_layer.is_adjacent(group_layer) {
            total += LAYER_BONUS_ADJACENT;
        }
    }
    total
}

fn group_type_for(hint: &HintGroup) -> GroupType {
    hint.group_type
}

/// Step 1: seed groups from caller hints and assign every hinted path to its named group.
fn seed_from_hints(hints: &[HintGroup]) -> (Vec<Group>, Ownership) {
    let mut groups = Vec::with_capacity(hints.len());
    let mut ownership = Ownership::new();
    for hint in hints {
        let mut group = Group::new(hint.id.clone(), hint.display_name.clone(), group_type_for(hint));
        group.description = hint.description.clone();
        if let Some(deps) = &hint.deps {
            group.deps = deps.iter().cloned().collect();
        }
        for path in &hint.files {
            group.files.insert(path.clone());
            ownership.insert(path.clone(), group.id.clone());
        }
        groups.push(group);
    }
    (groups, ownership)
}

const CATCH_ALL_GROUP_ID: &str = "ungrouped";

/// Step 2: assign every remaining touched path to the highest-scoring existing group, or to a
/// catch-all group if no hint group scores above zero.
fn assign_unassigned(
    groups: &mut Vec<Group>,
    ownership: &mut Ownership,
    touched: &BTreeSet<PathBuf>,
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    total_commits: usize,
) {
    let ctx = ScoringContext {
        symbol_index,
        cochange,
        total_commits,
    };

    for path in touched {
        if ownership.contains_key(path) {
            continue;
        }
        let best = groups
            .iter()
            .map(|g| (g.id.clone(), score(path, g, &ctx)))
            .filter(|(_, s)| *s > 0.0)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let group_id = match best {
            Some((id, _)) => id,
            None => {
                if !groups.iter().any(|g| g.id == CATCH_ALL_GROUP_ID) {
                    groups.push(Group::new(CATCH_ALL_GROUP_ID, "Ungrouped changes", GroupType::Chore));
                }
                CATCH_ALL_GROUP_ID.to_string()
            }
        };

        if let Some(group) = groups.iter_mut().find(|g| g.id == group_id) {
            group.files.insert(path.clone());
        }
        ownership.insert(path.clone(), group_id);
    }
}

/// Step 3: re-score every hinted path's current assignment against every group. A path only
/// moves when the best alternative clears both `config.reassign_threshold` in absolute terms and
/// `config.min_advantage` over its current assignment — a close or weak alternative never bumps
/// a caller-supplied hint.
fn validate_hint_assignments(
    groups: &mut Vec<Group>,
    ownership: &mut Ownership,
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    total_commits: usize,
    config: &EngineConfig,
) -> Vec<(PathBuf, String, String, f64)> {
    let ctx = ScoringContext {
        symbol_index,
        cochange,
        total_commits,
    };
    let mut reassignments = Vec::new();

    let paths: Vec<PathBuf> = ownership.keys().cloned().collect();
    for path in paths {
        let current_id = ownership[&path].clone();
        let current_score = groups
            .iter()
            .find(|g| g.id == current_id)
            .map(|g| score(&path, g, &ctx))
            .unwrap_or(0.0);

        let better = groups
            .iter()
            .filter(|g| g.id != current_id)
            .map(|g| (g.id.clone(), score(&path, g, &ctx)))
            .filter(|(_, s)| {
                *s >= config.reassign_threshold && *s - current_score >= config.min_advantage
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        if let Some((new_id, new_score)) = better {
            if let Some(group) = groups.iter_mut().find(|g| g.id == current_id) {
                group.files.remove(&path);
            }
            if let Some(group) = groups.iter_mut().find(|g| g.id == new_id) {
                group.files.insert(path.clone());
            }
            reassignments.push((path.clone(), current_id, new_id.clone(), new_score));
            ownership.insert(path, new_id);
        }
    }
    reassignments
}

pub struct PartitionResult {
    pub groups: Vec<Group>,
    pub ownership: Ownership,
    pub reassignments: Vec<(PathBuf, String, String, f64)>,
}

pub fn partition(
    deltas: &[Delta],
    hints: &[HintGroup],
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    config: &EngineConfig,
) -> Result<PartitionResult, StackingError> {
    let touched = touched_paths(deltas);
    let (mut groups, mut ownership) = seed_from_hints(hints);

    assign_unassigned(&mut groups, &mut ownership, &touched, symbol_index, cochange, deltas.len());

    let reassignments = validate_hint_assignments(
        &mut groups,
        &mut ownership,
        symbol_index,
        cochange,
        deltas.len(),
        config,
    );

    groups.retain(|g| !g.files.is_empty());

    if ownership.is_empty() {
        return Err(StackingError::EmptyOwnership {
            touched_paths: touched.len(),
        });
    }

    Ok(PartitionResult {
        groups,
        ownership,
        reassignments,
    })
}
