//! Value types passed between pipeline phases. Nothing here is mutated in place — every phase
//! that "transforms" a prior artifact (C4/C5 on groups and ownership) produces a fresh value.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hash::ObjectHash;
use crate::internal::object::signature::Author;
use crate::internal::object::tree::TreeItemMode;

/// Resolved base/head repository context produced by C1. No writes happen here.
#[derive(Debug, Clone)]
pub struct Context {
    pub repo_path: PathBuf,
    pub base_sha: ObjectHash,
    pub head_sha: ObjectHash,
}

/// The kind of change a path underwent within one [`Delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// A single path's change within one commit, carrying everything needed to rebuild that path's
/// tree entry without re-reading the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub old_path: Option<PathBuf>,
    pub status: ChangeStatus,
    pub new_blob_id: Option<ObjectHash>,
    pub new_mode: Option<TreeItemMode>,
    pub old_blob_id: Option<ObjectHash>,
}

/// The change set of a single source commit on the first-parent path.
#[derive(Debug, Clone)]
pub struct Delta {
    pub sha: ObjectHash,
    pub date: i64,
    pub changes: Vec<FileChange>,
}

/// One file's exports and the imports it declares, resolved against in-repo paths where possible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSymbols {
    pub exports: BTreeSet<String>,
    pub imports: Vec<ImportEdge>,
}

/// A resolved (or unresolved-and-discarded) import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEdge {
    pub from_path: PathBuf,
    pub names: BTreeSet<String>,
}

/// `path -> { exports, imports }`, built only for parseable files at head.
pub type SymbolIndex = BTreeMap<PathBuf, FileSymbols>;

/// The kind of stacked PR a group represents. Purely descriptive; carried through to the
/// commit message trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    Feature,
    Refactor,
    Bugfix,
    Chore,
    Docs,
    Test,
    Config,
}

/// A cohort of changed files intended to become one stacked commit.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub display_name: String,
    pub group_type: GroupType,
    pub description: String,
    pub files: BTreeSet<PathBuf>,
    pub deps: BTreeSet<String>,
}

impl Group {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, group_type: GroupType) -> Self {
        Group {
            id: id.into(),
            display_name: display_name.into(),
            group_type,
            description: String::new(),
            files: BTreeSet::new(),
            deps: BTreeSet::new(),
        }
    }
}

/// Total function over every path mentioned in any [`Delta`]: exactly one owning group id.
pub type Ownership = BTreeMap<PathBuf, String>;

/// The caller-supplied starting grouping, possibly incomplete or noisy.
#[derive(Debug, Clone)]
pub struct HintGroup {
    pub id: String,
    pub display_name: String,
    pub group_type: GroupType,
    pub description: String,
    pub files: Vec<PathBuf>,
    pub deps: Option<Vec<String>>,
}

/// `group_id -> [group_id, ...]` it depends on, supplied by the caller.
pub type DeclaredDeps = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintEdgeKind {
    /// Tried first during the priority rebuild, and the one kept when a mutual pair with a
    /// `dependency` edge forces a choice — a path-order edge reflects what actually happened in
    /// history, a dependency edge is only a caller's declared hint.
    PathOrder,
    Dependency,
}

/// Evidence for a `path-order` edge: the path whose ownership moved, and the commits at which.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOrderEvidence {
    pub path: PathBuf,
    pub from_commit: ObjectHash,
    pub to_commit: ObjectHash,
    pub from_commit_index: usize,
    pub to_commit_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintEdge {
    pub from: String,
    pub to: String,
    pub kind: ConstraintEdgeKind,
    pub evidence: Option<PathOrderEvidence>,
}

/// One group's place in the DAG: its parents, transitive ancestors, predicted tree, and the
/// deltas it applies.
#[derive(Debug, Clone)]
pub struct PlannedGroup {
    pub id: String,
    pub parents: Vec<String>,
    pub ancestors: BTreeSet<String>,
    pub expected_tree: ObjectHash,
    pub files: BTreeSet<PathBuf>,
    pub deltas_applied: Vec<FileChange>,
    /// Latest timestamp among the source commits this group draws changes from — used as the
    /// synthesized commit's own author/committer date.
    pub max_delta_date: i64,
}

#[derive(Debug, Clone)]
pub struct DagPlan {
    pub groups: Vec<PlannedGroup>,
    pub topo_order: Vec<String>,
    /// Groups with no outgoing constraint edge. A single leaf's own tree already reproduces
    /// `final_tree`; more than one leaf means C8 must synthesize a merge commit joining them.
    pub leaves: Vec<String>,
    /// The union of every group's deltas applied onto the base tree — independent of DAG shape,
    /// since ownership is a total partition over touched paths. Must equal the head tree at C9.
    pub final_tree: ObjectHash,
}

/// One materialized group commit.
#[derive(Debug, Clone)]
pub struct ExecutedGroupCommit {
    pub group_id: String,
    pub branch_name: String,
    pub commit_sha: ObjectHash,
    pub parent_shas: Vec<ObjectHash>,
}

#[derive(Debug, Clone)]
pub struct ExecutedStack {
    pub group_commits: Vec<ExecutedGroupCommit>,
    /// Populated only when the plan has more than one leaf: the synthetic join commit whose
    /// parents are every leaf's commit and whose tree is [`DagPlan::final_tree`].
    pub merge_commit: Option<ExecutedGroupCommit>,
    pub final_tree_sha: ObjectHash,
    pub source_copy_branch: String,
}

/// Run-level inputs supplied by the caller, gathered under one value for convenience.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub repo_path: PathBuf,
    pub base_sha: ObjectHash,
    pub head_sha: ObjectHash,
    pub pr_number: u64,
    pub head_branch: String,
    pub pr_title: Option<String>,
    pub hint_groups: Vec<HintGroup>,
    pub declared_deps: Option<DeclaredDeps>,
    pub author: Author,
}
