//! C7 — Plan Builder: turns the ownership map plus the feasibility order into a [`DagPlan`],
//! computing each group's direct parents (via transitive reduction of the constraint DAG), its
//! full ancestor set, and the tree it's expected to produce once applied.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::hash::ObjectHash;
use crate::internal::index::TreeIndex;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;
use crate::stacking::model::{
    ChangeStatus, ConstraintEdge, DagPlan, Delta, FileChange, Group, PlannedGroup,
};
use crate::stacking::treewalk::tree_index_from_root;

fn build_dag(groups: &[Group], edges: &[ConstraintEdge]) -> (DiGraph<String, ()>, BTreeMap<String, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index = BTreeMap::new();
    for group in groups {
        index.insert(group.id.clone(), graph.add_node(group.id.clone()));
    }
    for edge in edges {
        if let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) {
            graph.add_edge(from, to, ());
        }
    }
    (graph, index)
}

fn ancestors_of(graph: &DiGraph<String, ()>, index: &BTreeMap<String, NodeIndex>, id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![index[id]];
    while let Some(node) = stack.pop() {
        for edge in graph.edges_directed(node, petgraph::Direction::Incoming) {
            let parent = edge.source();
            let parent_id = graph[parent].clone();
            if seen.insert(parent_id) {
                stack.push(parent);
            }
        }
    }
    seen
}

/// Direct parents of `id`: predecessors not reachable through any other predecessor. Computed by
/// hand rather than via a generic reduction routine, since the graph here is small (one node per
/// stacked commit) and the only thing that matters is dropping edges implied by the rest.
fn direct_parents_of(graph: &DiGraph<String, ()>, index: &BTreeMap<String, NodeIndex>, id: &str) -> Vec<String> {
    let node = index[id];
    let predecessors: Vec<NodeIndex> = graph.edges_directed(node, petgraph::Direction::Incoming).map(|e| e.source()).collect();

    let mut direct = Vec::new();
    for &candidate in &predecessors {
        let candidate_id = graph[candidate].clone();
        let implied_by_another = predecessors.iter().any(|&other| {
            other != candidate && ancestors_of(graph, index, &graph[other]).contains(&candidate_id)
        });
        if !implied_by_another {
            direct.push(candidate_id);
        }
    }
    direct.sort();
    direct
}

/// Every delta's [`FileChange`] entries whose path belongs to `group`, in delta (chronological)
/// order — the exact sequence C8 replays to build that group's tree.
fn deltas_for_group(deltas: &[Delta], group: &Group) -> Vec<FileChange> {
    let mut applied = Vec::new();
    for delta in deltas {
        for change in &delta.changes {
            if group.files.contains(&change.path) {
                applied.push(change.clone());
            }
        }
    }
    applied
}

/// Groups with no outgoing constraint edge — the join points C8 must merge when there's more
/// than one.
fn leaves_of(graph: &DiGraph<String, ()>, index: &BTreeMap<String, NodeIndex>) -> Vec<String> {
    let mut leaves: Vec<String> = index
        .iter()
        .filter(|(_, &node)| graph.edges_directed(node, petgraph::Direction::Outgoing).next().is_none())
        .map(|(id, _)| id.clone())
        .collect();
    leaves.sort();
    leaves
}

fn apply_change(index: &mut TreeIndex, change: &FileChange) {
    match change.status {
        ChangeStatus::Deleted => {
            index.remove(&change.path);
        }
        ChangeStatus::Renamed => {
            if let Some(old) = &change.old_path {
                index.remove(old);
            }
            if let (Some(mode), Some(id)) = (change.new_mode, change.new_blob_id) {
                index.insert(change.path.clone(), mode, id);
            }
        }
        ChangeStatus::Added | ChangeStatus::Modified => {
            if let (Some(mode), Some(id)) = (change.new_mode, change.new_blob_id) {
                index.insert(change.path.clone(), mode, id);
            }
        }
    }
}

fn max_delta_date_for(deltas: &[Delta], group: &Group) -> i64 {
    deltas
        .iter()
        .filter(|d| d.changes.iter().any(|c| group.files.contains(&c.path)))
        .map(|d| d.date)
        .max()
        .unwrap_or(0)
}

/// Builds a tree by applying every group in `ids`'s own deltas onto `base_tree`. Safe to call in
/// any order because ownership is a total partition over touched paths — no two groups in `ids`
/// ever touch the same path, so there's nothing for application order to disagree about.
async fn tree_for_group_set(
    store: &dyn ObjectStore,
    base_tree: ObjectHash,
    deltas: &[Delta],
    group_by_id: &BTreeMap<&str, &Group>,
    ids: &BTreeSet<String>,
) -> Result<(ObjectHash, Vec<crate::internal::object::tree::Tree>), StackingError> {
    let mut tree_index = tree_index_from_root(store, base_tree).await?;
    for id in ids {
        let Some(&group) = group_by_id.get(id.as_str()) else {
            continue;
        };
        for change in deltas_for_group(deltas, group) {
            apply_change(&mut tree_index, &change);
        }
    }
    Ok(tree_index.build()?)
}

/// Builds the full [`DagPlan`]: direct parents via transitive reduction, ancestor sets, and each
/// group's expected resulting tree — built fresh from `base_tree` plus that group's own ancestor
/// set each time, so a branching DAG's leaves don't leak each other's changes into one another.
pub async fn build_plan(
    store: &dyn ObjectStore,
    base_tree: ObjectHash,
    groups: &[Group],
    deltas: &[Delta],
    edges: &[ConstraintEdge],
    topo_order: &[String],
) -> Result<DagPlan, StackingError> {
    let (graph, index) = build_dag(groups, edges);
    let group_by_id: BTreeMap<&str, &Group> = groups.iter().map(|g| (g.id.as_str(), g)).collect();
    let leaves = leaves_of(&graph, &index);

    let mut planned = Vec::with_capacity(groups.len());

    for id in topo_order {
        let Some(&group) = group_by_id.get(id.as_str()) else {
            continue;
        };

        let parents = direct_parents_of(&graph, &index, id);
        let ancestors = ancestors_of(&graph, &index, id);
        let applied = deltas_for_group(deltas, group);

        let mut own_and_ancestors = ancestors.clone();
        own_and_ancestors.insert(id.clone());
        let (expected_tree, _) =
            tree_for_group_set(store, base_tree, deltas, &group_by_id, &own_and_ancestors).await?;

        planned.push(PlannedGroup {
            id: id.clone(),
            parents,
            ancestors,
            expected_tree,
            files: group.files.clone(),
            deltas_applied: applied,
            max_delta_date: max_delta_date_for(deltas, group),
        });
    }

    let all_ids: BTreeSet<String> = groups.iter().map(|g| g.id.clone()).collect();
    let (final_tree, _) = tree_for_group_set(store, base_tree, deltas, &group_by_id, &all_ids).await?;

    Ok(DagPlan {
        groups: planned,
        topo_order: topo_order.to_vec(),
        leaves,
        final_tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};
    use crate::internal::object::blob::Blob;
    use crate::internal::object::tree::{Tree, TreeItem, TreeItemMode};
    use crate::repository::MemoryRepository;
    use crate::stacking::model::GroupType;
    use std::path::PathBuf;

    #[tokio::test]
    async fn single_group_plan_applies_its_changes() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let readme = Blob::from_content(b"hi\n".to_vec());
        repo.seed_blob(&readme);
        let base_tree =
            Tree::from_tree_items(vec![TreeItem::new(TreeItemMode::Blob, readme.id, "README.md".to_string())])
                .unwrap();
        repo.seed_tree(&base_tree).unwrap();

        let auth = Blob::from_content(b"export const x = 1;\n".to_vec());
        repo.seed_blob(&auth);

        let mut group = Group::new("g1", "Group 1", GroupType::Feature);
        group.files.insert(PathBuf::from("src/auth.ts"));

        let deltas = vec![Delta {
            sha: ObjectHash::new(b"c1"),
            date: 10,
            changes: vec![FileChange {
                path: PathBuf::from("src/auth.ts"),
                old_path: None,
                status: ChangeStatus::Added,
                new_blob_id: Some(auth.id),
                new_mode: Some(TreeItemMode::Blob),
                old_blob_id: None,
            }],
        }];

        let plan = build_plan(&repo, base_tree.id, &[group], &deltas, &[], &["g1".to_string()])
            .await
            .unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert!(plan.groups[0].parents.is_empty());
    }

    #[tokio::test]
    async fn dependent_group_inherits_parent_from_edge() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let base_tree = Tree::from_tree_items(vec![TreeItem::new(
            TreeItemMode::Blob,
            Blob::from_content(b"x\n".to_vec()).id,
            "README.md".to_string(),
        )])
        .unwrap();
        repo.seed_tree(&base_tree).unwrap();

        let a = Group::new("a", "A", GroupType::Feature);
        let b = Group::new("b", "B", GroupType::Feature);
        let edges = vec![ConstraintEdge {
            from: "a".to_string(),
            to: "b".to_string(),
            kind: crate::stacking::model::ConstraintEdgeKind::Dependency,
            evidence: None,
        }];

        let plan = build_plan(
            &repo,
            base_tree.id,
            &[a, b],
            &[],
            &edges,
            &["a".to_string(), "b".to_string()],
        )
        .await
        .unwrap();
        let b_plan = plan.groups.iter().find(|g| g.id == "b").unwrap();
        assert_eq!(b_plan.parents, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn multi_leaf_dag_does_not_leak_sibling_changes_and_final_tree_unions_everything() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let readme = Blob::from_content(b"hi\n".to_vec());
        repo.seed_blob(&readme);
        let base_tree =
            Tree::from_tree_items(vec![TreeItem::new(TreeItemMode::Blob, readme.id, "README.md".to_string())])
                .unwrap();
        repo.seed_tree(&base_tree).unwrap();

        let core_blob = Blob::from_content(b"export const core = 1;\n".to_vec());
        let ui_blob = Blob::from_content(b"export const ui = 1;\n".to_vec());
        let api_blob = Blob::from_content(b"export const api = 1;\n".to_vec());
        repo.seed_blob(&core_blob);
        repo.seed_blob(&ui_blob);
        repo.seed_blob(&api_blob);

        let mut a = Group::new("a", "Core", GroupType::Feature);
        a.files.insert(PathBuf::from("src/core.ts"));
        let mut b = Group::new("b", "UI", GroupType::Feature);
        b.files.insert(PathBuf::from("src/ui.ts"));
        let mut c = Group::new("c", "Api", GroupType::Feature);
        c.files.insert(PathBuf::from("src/api.ts"));

        let edges = vec![
            ConstraintEdge {
                from: "a".to_string(),
                to: "b".to_string(),
                kind: crate::stacking::model::ConstraintEdgeKind::PathOrder,
                evidence: None,
            },
            ConstraintEdge {
                from: "a".to_string(),
                to: "c".to_string(),
                kind: crate::stacking::model::ConstraintEdgeKind::PathOrder,
                evidence: None,
            },
        ];

        let deltas = vec![
            Delta {
                sha: ObjectHash::new(b"c1"),
                date: 10,
                changes: vec![FileChange {
                    path: PathBuf::from("src/core.ts"),
                    old_path: None,
                    status: ChangeStatus::Added,
                    new_blob_id: Some(core_blob.id),
                    new_mode: Some(TreeItemMode::Blob),
                    old_blob_id: None,
                }],
            },
            Delta {
                sha: ObjectHash::new(b"c2"),
                date: 20,
                changes: vec![FileChange {
                    path: PathBuf::from("src/ui.ts"),
                    old_path: None,
                    status: ChangeStatus::Added,
                    new_blob_id: Some(ui_blob.id),
                    new_mode: Some(TreeItemMode::Blob),
                    old_blob_id: None,
                }],
            },
            Delta {
                sha: ObjectHash::new(b"c3"),
                date: 30,
                changes: vec![FileChange {
                    path: PathBuf::from("src/api.ts"),
                    old_path: None,
                    status: ChangeStatus::Added,
                    new_blob_id: Some(api_blob.id),
                    new_mode: Some(TreeItemMode::Blob),
                    old_blob_id: None,
                }],
            },
        ];

        let plan = build_plan(
            &repo,
            base_tree.id,
            &[a, b, c],
            &deltas,
            &edges,
            &["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(plan.leaves, vec!["b".to_string(), "c".to_string()]);

        let b_plan = plan.groups.iter().find(|g| g.id == "b").unwrap();
        let c_plan = plan.groups.iter().find(|g| g.id == "c").unwrap();
        assert_ne!(
            b_plan.expected_tree, c_plan.expected_tree,
            "sibling leaves must not see each other's changes"
        );

        let b_flat = crate::stacking::treewalk::flatten_tree(&repo, b_plan.expected_tree).await.unwrap();
        assert!(b_flat.contains_key(&PathBuf::from("src/ui.ts")));
        assert!(!b_flat.contains_key(&PathBuf::from("src/api.ts")));

        let c_flat = crate::stacking::treewalk::flatten_tree(&repo, c_plan.expected_tree).await.unwrap();
        assert!(c_flat.contains_key(&PathBuf::from("src/api.ts")));
        assert!(!c_flat.contains_key(&PathBuf::from("src/ui.ts")));

        let final_flat = crate::stacking::treewalk::flatten_tree(&repo, plan.final_tree).await.unwrap();
        assert!(final_flat.contains_key(&PathBuf::from("src/core.ts")));
        assert!(final_flat.contains_key(&PathBuf::from("src/ui.ts")));
        assert!(final_flat.contains_key(&PathBuf::from("src/api.ts")));
        assert!(final_flat.contains_key(&PathBuf::from("README.md")));
    }
}
