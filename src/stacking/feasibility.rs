//! C6 — Feasibility & Cycle Resolver: builds the constraint DAG (path-order edges from ownership
//! history plus declared dependency edges), breaks any cycles by priority, and produces a
//! deterministic topological order via Kahn's algorithm.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::stacking::errors::StackingError;
use crate::stacking::model::{
    ConstraintEdge, ConstraintEdgeKind, DeclaredDeps, Delta, Group, Ownership, PathOrderEvidence,
};
use crate::stacking::warnings::WarningsBag;

/// Derives `path-order` edges: for every path touched by more than one commit, if ownership of
/// that path (as of the owning group, which is a group-level property, not per-commit) implies an
/// earlier commit's change logically precedes a later one, record an edge from the earlier
/// owning group to the later one. Since ownership is fixed per path for the whole run, the
/// signal comes from paths that are *imported by* a later-touched path, forcing the group that
/// introduces the dependency to land before the group that consumes it.
fn path_order_edges(deltas: &[Delta], ownership: &Ownership) -> Vec<ConstraintEdge> {
    let mut first_touch: BTreeMap<&std::path::Path, (usize, &crate::hash::ObjectHash)> = BTreeMap::new();
    for (idx, delta) in deltas.iter().enumerate() {
        for change in &delta.changes {
            first_touch.entry(&change.path).or_insert((idx, &delta.sha));
        }
    }

    let mut edges = Vec::new();
    let mut seen = BTreeSet::new();
    for (idx, delta) in deltas.iter().enumerate() {
        for change in &delta.changes {
            let Some(owner) = ownership.get(&change.path) else {
                continue;
            };
            if let Some(old_path) = &change.old_path {
                let Some(&(from_idx, from_sha)) = first_touch.get(old_path.as_path()) else {
                    continue;
                };
                let Some(old_owner) = ownership.get(old_path) else {
                    continue;
                };
                if old_owner != owner && from_idx < idx {
                    let key = (old_owner.clone(), owner.clone());
                    if seen.insert(key) {
                        edges.push(ConstraintEdge {
                            from: old_owner.clone(),
                            to: owner.clone(),
                            kind: ConstraintEdgeKind::PathOrder,
                            evidence: Some(PathOrderEvidence {
                                path: change.path.clone(),
                                from_commit: *from_sha,
                                to_commit: delta.sha,
                                from_commit_index: from_idx,
                                to_commit_index: idx,
                            }),
                        });
                    }
                }
            }
        }
    }
    edges
}

fn dependency_edges(groups: &[Group], declared: Option<&DeclaredDeps>) -> Vec<ConstraintEdge> {
    let group_ids: BTreeSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    let mut edges = Vec::new();

    for group in groups {
        for dep in &group.deps {
            if group_ids.contains(dep.as_str()) {
                edges.push(ConstraintEdge {
                    from: dep.clone(),
                    to: group.id.clone(),
                    kind: ConstraintEdgeKind::Dependency,
                    evidence: None,
                });
            }
        }
    }
    if let Some(declared) = declared {
        for (group_id, deps) in declared {
            if !group_ids.contains(group_id.as_str()) {
                continue;
            }
            for dep in deps {
                if group_ids.contains(dep.as_str()) {
                    edges.push(ConstraintEdge {
                        from: dep.clone(),
                        to: group_id.clone(),
                        kind: ConstraintEdgeKind::Dependency,
                        evidence: None,
                    });
                }
            }
        }
    }
    edges
}

/// Deduplicates by `(from, to)`, keeping the first occurrence — path-order edges are built before
/// dependency edges, so a path-order edge wins a same-pair collision.
fn dedup_edges(edges: Vec<ConstraintEdge>) -> Vec<ConstraintEdge> {
    let mut seen = BTreeSet::new();
    let mut kept = Vec::new();
    for edge in edges {
        if seen.insert((edge.from.clone(), edge.to.clone())) {
            kept.push(edge);
        }
    }
    kept
}

/// Step 1 of cycle breaking: for any pair where both `a→b` and `b→a` exist and one of the two is
/// `path-order` and the other `dependency`, drop the `dependency` one. Pairs that are mutual in
/// the same kind are left for the priority rebuild.
fn mutual_pre_pass(edges: Vec<ConstraintEdge>, warnings: &mut WarningsBag) -> Vec<ConstraintEdge> {
    let kind_of: BTreeMap<(String, String), ConstraintEdgeKind> =
        edges.iter().map(|e| ((e.from.clone(), e.to.clone()), e.kind)).collect();

    let mut kept = Vec::new();
    for edge in edges {
        if edge.kind == ConstraintEdgeKind::Dependency {
            if let Some(&ConstraintEdgeKind::PathOrder) = kind_of.get(&(edge.to.clone(), edge.from.clone())) {
                warnings.push_cycle_edge_dropped(edge);
                continue;
            }
        }
        kept.push(edge);
    }
    kept
}

/// Step 2: sort the survivors `path-order (0) < dependency (1)`, tie-broken by `(from, to)` for
/// determinism, then add them to an initially edge-less graph one at a time — an edge that would
/// close a cycle is dropped instead of added. Lower priority edges are tried first, so a
/// path-order edge is preferred over a dependency edge when only one of the two can survive.
fn priority_rebuild(
    groups: &[Group],
    edges: Vec<ConstraintEdge>,
    warnings: &mut WarningsBag,
) -> (DiGraph<String, ConstraintEdgeKind>, BTreeMap<String, NodeIndex>, Vec<ConstraintEdge>) {
    let mut graph = DiGraph::new();
    let mut index = BTreeMap::new();
    for group in groups {
        index.insert(group.id.clone(), graph.add_node(group.id.clone()));
    }

    let mut sorted = edges;
    sorted.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.from.cmp(&b.from)).then_with(|| a.to.cmp(&b.to)));

    let mut kept = Vec::new();
    for edge in sorted {
        let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
            continue;
        };
        let edge_idx = graph.add_edge(from, to, edge.kind);
        if petgraph::algo::is_cyclic_directed(&graph) {
            graph.remove_edge(edge_idx);
            warnings.push_cycle_edge_dropped(edge);
        } else {
            kept.push(edge);
        }
    }
    (graph, index, kept)
}

/// Kahn's algorithm with ties on the earliest commit date among a group's member deltas, then
/// group id, for a fully deterministic order.
fn topo_order(
    graph: &DiGraph<String, ConstraintEdgeKind>,
    index: &BTreeMap<String, NodeIndex>,
    earliest_date: &BTreeMap<String, i64>,
) -> Vec<String> {
    #[derive(Eq, PartialEq)]
    struct Candidate {
        date: i64,
        id: String,
    }
    impl Ord for Candidate {
        fn cmp(&self, other: &Self) -> Ordering {
            other.date.cmp(&self.date).then_with(|| other.id.cmp(&self.id))
        }
    }
    impl PartialOrd for Candidate {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut indegree: BTreeMap<NodeIndex, usize> = BTreeMap::new();
    for node in graph.node_indices() {
        indegree.insert(node, 0);
    }
    for edge in graph.edge_references() {
        *indegree.entry(edge.target()).or_insert(0) += 1;
    }

    let mut heap = BinaryHeap::new();
    for (id, &node) in index {
        if indegree.get(&node).copied().unwrap_or(0) == 0 {
            heap.push(Candidate {
                date: earliest_date.get(id).copied().unwrap_or(0),
                id: id.clone(),
            });
        }
    }

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Candidate { id, .. }) = heap.pop() {
        order.push(id.clone());
        let node = index[&id];
        for edge in graph.edges(node) {
            let target = edge.target();
            let entry = indegree.get_mut(&target).unwrap();
            *entry -= 1;
            if *entry == 0 {
                let target_id = &graph[target];
                heap.push(Candidate {
                    date: earliest_date.get(target_id).copied().unwrap_or(0),
                    id: target_id.clone(),
                });
            }
        }
    }
    order
}

pub struct FeasibilityResult {
    pub order: Vec<String>,
    pub edges: Vec<ConstraintEdge>,
}

pub fn resolve(
    groups: &[Group],
    deltas: &[Delta],
    ownership: &Ownership,
    declared_deps: Option<&DeclaredDeps>,
    warnings: &mut WarningsBag,
) -> Result<FeasibilityResult, StackingError> {
    let mut edges = path_order_edges(deltas, ownership);
    edges.extend(dependency_edges(groups, declared_deps));
    edges = dedup_edges(edges);
    edges = mutual_pre_pass(edges, warnings);
    let (graph, index, edges) = priority_rebuild(groups, edges, warnings);

    let mut earliest_date: BTreeMap<String, i64> = BTreeMap::new();
    for group in groups {
        let date = deltas
            .iter()
            .filter(|d| d.changes.iter().any(|c| group.files.contains(&c.path)))
            .map(|d| d.date)
            .min()
            .unwrap_or(0);
        earliest_date.insert(group.id.clone(), date);
    }

    let order = topo_order(&graph, &index, &earliest_date);
    Ok(FeasibilityResult { order, edges })
}
