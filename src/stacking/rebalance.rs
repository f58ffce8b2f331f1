//! C5 — Coupling & Rebalance: iteratively splits oversize groups, merges empty/singleton groups
//! with a strong pull toward another group, and folds in co-change evidence the partitioner
//! couldn't see file-by-file. Each pass is idempotent; the whole thing is capped at a fixed number
//! of rounds so a pathological input can't loop forever.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::stacking::group::{ScoringContext, ordered_pair};
use crate::stacking::model::{Group, GroupType, Ownership, SymbolIndex};
use crate::stacking::partition::{s_import, score};
use crate::stacking::warnings::WarningsBag;

const MAX_ROUNDS: usize = 8;
/// Import-score gate for merging a singleton into another group (spec §4.5).
const SINGLETON_MERGE_THRESHOLD: f64 = 0.6;

/// Union-find clustering of a group's files by pairwise affinity, in priority order: an import
/// edge between two files always merges them; a shared top-level directory merges whatever isn't
/// already linked by an import edge; a co-change count at or above `cochange_floor` merges
/// whatever is still isolated after the first two passes.
fn cluster_by_affinity(
    files: &[PathBuf],
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    cochange_floor: u32,
) -> Vec<Vec<PathBuf>> {
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
        }
    }

    let index: BTreeMap<&PathBuf, usize> = files.iter().enumerate().map(|(i, p)| (p, i)).collect();
    let mut parent: Vec<usize> = (0..files.len()).collect();

    for path in files {
        if let Some(symbols) = symbol_index.get(path) {
            for edge in &symbols.imports {
                if let Some(&other_idx) = index.get(&edge.from_path) {
                    union(&mut parent, index[path], other_idx);
                }
            }
        }
    }

    let mut by_top_dir: BTreeMap<PathBuf, usize> = BTreeMap::new();
    for path in files {
        let top = path.components().next().map(|c| PathBuf::from(c.as_os_str())).unwrap_or_default();
        let idx = index[path];
        if let Some(&first) = by_top_dir.get(&top) {
            union(&mut parent, first, idx);
        } else {
            by_top_dir.insert(top, idx);
        }
    }

    for i in 0..files.len() {
        for j in (i + 1)..files.len() {
            if find(&mut parent, i) == find(&mut parent, j) {
                continue;
            }
            let (a, b) = ordered_pair(&files[i], &files[j]);
            if cochange.get(&(a, b)).copied().unwrap_or(0) >= cochange_floor {
                union(&mut parent, i, j);
            }
        }
    }

    let mut clusters: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
    for (i, path) in files.iter().enumerate() {
        let root = find(&mut parent, i);
        clusters.entry(root).or_default().push(path.clone());
    }
    clusters.into_values().collect()
}

fn split_oversize(
    groups: &mut Vec<Group>,
    ownership: &mut Ownership,
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    config: &EngineConfig,
) -> bool {
    let mut changed = false;
    let mut additions = Vec::new();

    for group in groups.iter_mut() {
        if group.files.len() <= config.max_group_size {
            continue;
        }
        let files: Vec<PathBuf> = group.files.iter().cloned().collect();
        let mut clusters = cluster_by_affinity(&files, symbol_index, cochange, config.cochange_floor);
        if clusters.len() <= 1 {
            continue;
        }

        changed = true;
        clusters.sort_by(|a, b| a[0].cmp(&b[0]));
        clusters.remove(0); // the first cluster stays in the original group
        for (idx, cluster) in clusters.into_iter().enumerate() {
            let sub_id = format!("{}-split-{}", group.id, idx + 1);
            let dir_hint = cluster[0]
                .components()
                .next()
                .map(|c| PathBuf::from(c.as_os_str()))
                .unwrap_or_default();
            let mut sub = Group::new(
                sub_id.clone(),
                format!("{} ({})", group.display_name, dir_hint.display()),
                group.group_type,
            );
            for path in cluster {
                group.files.remove(&path);
                sub.files.insert(path.clone());
                ownership.insert(path, sub_id.clone());
            }
            additions.push(sub);
        }
    }

    groups.extend(additions);
    changed
}

/// Merges a group with zero files (dropped outright) or exactly one file whose import-score to
/// some other group clears `SINGLETON_MERGE_THRESHOLD`.
fn merge_weak_groups(groups: &mut Vec<Group>, ownership: &mut Ownership, symbol_index: &SymbolIndex, warnings: &mut WarningsBag) -> bool {
    let mut changed = false;

    let weak_ids: Vec<String> = groups
        .iter()
        .filter(|g| g.files.len() <= 1)
        .map(|g| g.id.clone())
        .collect();

    for weak_id in weak_ids {
        if groups.len() <= 1 {
            break;
        }
        let Some(weak_idx) = groups.iter().position(|g| g.id == weak_id) else {
            continue;
        };
        let Some(path) = groups[weak_idx].files.iter().next().cloned() else {
            // empty group with no files at all: drop it outright.
            groups.remove(weak_idx);
            changed = true;
            continue;
        };

        let best = groups
            .iter()
            .filter(|g| g.id != weak_id)
            .map(|g| (g.id.clone(), s_import(&path, g, symbol_index)))
            .filter(|(_, import_score)| *import_score >= SINGLETON_MERGE_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        if let Some((target_id, import_score)) = best {
            if let Some(target) = groups.iter_mut().find(|g| g.id == target_id) {
                target.files.insert(path.clone());
            }
            ownership.insert(path.clone(), target_id.clone());
            groups.retain(|g| g.id != weak_id);
            warnings.push_reassignment(path.display().to_string(), weak_id, target_id, import_score);
            changed = true;
        }
    }

    changed
}

/// Co-change incorporation: for every pair of paths that co-change at least `cochange_floor`
/// times but live in different groups, reassign whichever side scores enough higher in the
/// other's group to clear the same threshold rule C4 uses.
fn incorporate_cochange(
    groups: &mut Vec<Group>,
    ownership: &mut Ownership,
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    total_commits: usize,
    config: &EngineConfig,
    warnings: &mut WarningsBag,
) -> bool {
    if total_commits == 0 {
        if !cochange.is_empty() {
            warnings.push_missing_cochange("no commit history available to compute co-change incorporation");
        }
        return false;
    }

    let ctx = ScoringContext {
        symbol_index,
        cochange,
        total_commits,
    };
    let mut changed = false;

    let mut pairs: Vec<(PathBuf, PathBuf, u32)> = cochange
        .iter()
        .filter(|(_, &count)| count >= config.cochange_floor)
        .map(|((a, b), &count)| (a.clone(), b.clone(), count))
        .collect();
    pairs.sort();

    for (a, b, _count) in pairs {
        let (Some(group_a), Some(group_b)) = (ownership.get(&a).cloned(), ownership.get(&b).cloned()) else {
            continue;
        };
        if group_a == group_b {
            continue;
        }
        try_move(groups, ownership, &ctx, config, warnings, &a, &group_a, &group_b, &mut changed);
        try_move(groups, ownership, &ctx, config, warnings, &b, &group_b, &group_a, &mut changed);
    }

    changed
}

/// Moves `path` from `from_group` into `to_group` if that clears the reassignment threshold rule,
/// mirroring C4's validation step.
#[allow(clippy::too_many_arguments)]
fn try_move(
    groups: &mut Vec<Group>,
    ownership: &mut Ownership,
    ctx: &ScoringContext,
    config: &EngineConfig,
    warnings: &mut WarningsBag,
    path: &Path,
    from_group: &str,
    to_group: &str,
    changed: &mut bool,
) {
    if ownership.get(path).map(|g| g.as_str()) != Some(from_group) {
        return; // already moved by an earlier pair in this pass
    }
    let Some(target) = groups.iter().find(|g| g.id == to_group) else {
        return;
    };
    let candidate_score = score(path, target, ctx);
    let current_score = groups
        .iter()
        .find(|g| g.id == from_group)
        .map(|g| score(path, g, ctx))
        .unwrap_or(0.0);
    if candidate_score < config.reassign_threshold || candidate_score - current_score < config.min_advantage {
        return;
    }

    if let Some(g) = groups.iter_mut().find(|g| g.id == from_group) {
        g.files.remove(path);
    }
    if let Some(g) = groups.iter_mut().find(|g| g.id == to_group) {
        g.files.insert(path.to_path_buf());
    }
    ownership.insert(path.to_path_buf(), to_group.to_string());
    warnings.push_reassignment(path.display().to_string(), from_group.to_string(), to_group.to_string(), candidate_score);
    *changed = true;
}

/// Runs split/merge/co-change passes to a fixed point (or `MAX_ROUNDS`, whichever comes first).
pub fn rebalance(
    mut groups: Vec<Group>,
    mut ownership: Ownership,
    symbol_index: &SymbolIndex,
    cochange: &BTreeMap<(PathBuf, PathBuf), u32>,
    total_commits: usize,
    config: &EngineConfig,
    warnings: &mut WarningsBag,
) -> (Vec<Group>, Ownership) {
    for _ in 0..MAX_ROUNDS {
        let split_changed = split_oversize(&mut groups, &mut ownership, symbol_index, cochange, config);
        let merge_changed = merge_weak_groups(&mut groups, &mut ownership, symbol_index, warnings);
        let cochange_changed =
            incorporate_cochange(&mut groups, &mut ownership, symbol_index, cochange, total_commits, config, warnings);
        if !split_changed && !merge_changed && !cochange_changed {
            break;
        }
    }
    groups.retain(|g| !g.files.is_empty());
    (groups, ownership)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_singleton_is_left_alone() {
        let mut group = Group::new("solo", "Solo", GroupType::Chore);
        group.files.insert(PathBuf::from("a.ts"));
        let ownership: Ownership = [("a.ts".into(), "solo".to_string())].into_iter().collect();
        let symbol_index = SymbolIndex::new();
        let cochange = BTreeMap::new();
        let config = EngineConfig::default();
        let mut warnings = WarningsBag::new();

        let (groups, _) =
            rebalance(vec![group], ownership, &symbol_index, &cochange, 1, &config, &mut warnings);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn singleton_with_no_import_pull_stays_separate() {
        let mut solo = Group::new("solo", "Solo", GroupType::Chore);
        solo.files.insert(PathBuf::from("a.ts"));
        let mut other = Group::new("other", "Other", GroupType::Chore);
        other.files.insert(PathBuf::from("b.ts"));
        let ownership: Ownership = [
            ("a.ts".into(), "solo".to_string()),
            ("b.ts".into(), "other".to_string()),
        ]
        .into_iter()
        .collect();
        let symbol_index = SymbolIndex::new();
        let cochange = BTreeMap::new();
        let config = EngineConfig::default();
        let mut warnings = WarningsBag::new();

        let (groups, _) = rebalance(
            vec![solo, other],
            ownership,
            &symbol_index,
            &cochange,
            1,
            &config,
            &mut warnings,
        );
        assert_eq!(groups.len(), 2);
        assert!(warnings.is_empty(), "no merge or reassignment happened, so nothing should warn");
    }

    #[test]
    fn singleton_with_strong_import_score_merges_into_the_other_group() {
        use crate::stacking::model::{FileSymbols, ImportEdge};
        use std::collections::BTreeSet;

        let mut solo = Group::new("solo", "Solo", GroupType::Chore);
        solo.files.insert(PathBuf::from("a.ts"));
        let mut other = Group::new("other", "Other", GroupType::Chore);
        other.files.insert(PathBuf::from("b.ts"));
        let ownership: Ownership = [
            ("a.ts".into(), "solo".to_string()),
            ("b.ts".into(), "other".to_string()),
        ]
        .into_iter()
        .collect();

        let mut symbol_index = SymbolIndex::new();
        symbol_index.insert(
            PathBuf::from("b.ts"),
            FileSymbols {
                exports: BTreeSet::new(),
                imports: vec![ImportEdge {
                    from_path: PathBuf::from("a.ts"),
                    names: BTreeSet::from(["x".to_string(), "y".to_string(), "z".to_string()]),
                }],
            },
        );

        let cochange = BTreeMap::new();
        let config = EngineConfig::default();
        let mut warnings = WarningsBag::new();

        let (groups, ownership) = rebalance(
            vec![solo, other],
            ownership,
            &symbol_index,
            &cochange,
            1,
            &config,
            &mut warnings,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(ownership[&PathBuf::from("a.ts")], "other");
        assert!(!warnings.is_empty());
    }

    #[test]
    fn qualifying_cochange_pair_pulls_a_path_into_the_other_group() {
        use crate::stacking::model::{FileSymbols, ImportEdge};
        use std::collections::BTreeSet;

        let mut a_group = Group::new("a", "A", GroupType::Chore);
        a_group.files.insert(PathBuf::from("x.ts"));
        a_group.files.insert(PathBuf::from("y.ts"));
        let mut b_group = Group::new("b", "B", GroupType::Chore);
        b_group.files.insert(PathBuf::from("z.ts"));
        let ownership: Ownership = [
            ("x.ts".into(), "a".to_string()),
            ("y.ts".into(), "a".to_string()),
            ("z.ts".into(), "b".to_string()),
        ]
        .into_iter()
        .collect();

        // y.ts and z.ts co-change often (above the floor) and z.ts consumes y.ts's exports —
        // together enough to clear the reassignment threshold despite y.ts currently sitting in a.
        let mut symbol_index = SymbolIndex::new();
        symbol_index.insert(
            PathBuf::from("y.ts"),
            FileSymbols {
                exports: BTreeSet::from(["p".to_string(), "q".to_string(), "r".to_string()]),
                imports: Vec::new(),
            },
        );
        symbol_index.insert(
            PathBuf::from("z.ts"),
            FileSymbols {
                exports: BTreeSet::new(),
                imports: vec![ImportEdge {
                    from_path: PathBuf::from("y.ts"),
                    names: BTreeSet::from(["p".to_string(), "q".to_string(), "r".to_string()]),
                }],
            },
        );

        let cochange: BTreeMap<(PathBuf, PathBuf), u32> =
            [((PathBuf::from("y.ts"), PathBuf::from("z.ts")), 10)].into_iter().collect();
        let config = EngineConfig::default();
        let mut warnings = WarningsBag::new();

        let (_, ownership) = rebalance(
            vec![a_group, b_group],
            ownership,
            &symbol_index,
            &cochange,
            10,
            &config,
            &mut warnings,
        );
        assert_eq!(ownership[&PathBuf::from("y.ts")], "b");
        assert!(!warnings.is_empty());
    }

    #[test]
    fn oversize_group_splits_by_top_level_dir() {
        let config = EngineConfig::default();
        let mut group = Group::new("big", "Big", GroupType::Chore);
        for i in 0..config.max_group_size + 1 {
            let dir = if i % 2 == 0 { "a" } else { "b" };
            group.files.insert(PathBuf::from(format!("{dir}/f{i}.ts")));
        }
        let ownership = Ownership::new();
        let symbol_index = SymbolIndex::new();
        let cochange = BTreeMap::new();
        let mut warnings = WarningsBag::new();

        let (groups, _) =
            rebalance(vec![group], ownership, &symbol_index, &cochange, 1, &config, &mut warnings);
        assert!(groups.len() > 1);
    }
}
