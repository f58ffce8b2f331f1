//! C8 — Executor: materializes each planned group as a real commit object, writing a ref per
//! group and a safety branch pointing at the original head before anything else happens.

use crate::hash::ObjectHash;
use crate::internal::index::TreeIndex;
use crate::internal::object::commit::Commit;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;
use crate::stacking::model::{
    ChangeStatus, Context, DagPlan, ExecutedGroupCommit, ExecutedStack, FileChange, PlannedGroup,
};
use crate::internal::object::signature::Author;

fn branch_name(pr_number: u64, index: usize, commit_sha: &ObjectHash) -> String {
    let hex = commit_sha.to_string();
    let short_hash = &hex[..6.min(hex.len())];
    format!("newpr-stack/pr-{pr_number}/{index}-{short_hash}")
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

fn trailer(pr_number: u64, group_id: &str) -> String {
    format!("\n\nStack-Group: {group_id}\nStack-Pr: {pr_number}")
}

/// Builds an in-memory index equal to the union of every tree in `parent_trees`. Safe regardless
/// of insertion order because ownership partitions paths across groups — no two parent trees ever
/// disagree about the same path.
async fn union_tree_index(
    store: &dyn ObjectStore,
    parent_trees: &[ObjectHash],
) -> Result<TreeIndex, StackingError> {
    let mut index = TreeIndex::new();
    for tree in parent_trees {
        let flat = crate::stacking::treewalk::flatten_tree(store, *tree).await?;
        for (path, (mode, id)) in flat {
            index.insert(path, mode, id);
        }
    }
    Ok(index)
}

/// Builds this group's tree as the union of its parents' trees plus its own deltas, writes the
/// resulting commit, and confirms the rebuilt tree matches the plan's prediction.
async fn commit_group(
    store: &dyn ObjectStore,
    parent_trees: &[ObjectHash],
    group: &PlannedGroup,
    parent_shas: &[ObjectHash],
    author: &Author,
    timestamp: i64,
    message: &str,
) -> Result<(ObjectHash, ObjectHash), StackingError> {
    let mut index = union_tree_index(store, parent_trees).await?;
    for change in &group.deltas_applied {
        apply_change(&mut index, change);
    }
    let (tree_id, trees) = index.build()?;

    if tree_id != group.expected_tree {
        return Err(StackingError::TreeMismatch {
            group: group.id.clone(),
            expected: group.expected_tree,
            actual: tree_id,
            diff_summary: format!("{} intermediate tree objects rebuilt", trees.len()),
        });
    }
    for tree in &trees {
        store.write_tree(tree).await?;
    }

    let commit = Commit::from_tree_id(tree_id, parent_shas.to_vec(), author, timestamp, 0, message);
    store.write_commit(&commit).await?;
    Ok((commit.id, tree_id))
}

/// Executes every group in `plan.topo_order`, writing one commit per group and a branch ref
/// pointing at it, plus a `source_copy_branch` safety ref pointing at the untouched head.
pub async fn execute(
    store: &dyn ObjectStore,
    ctx: &Context,
    plan: &DagPlan,
    pr_number: u64,
    pr_title: Option<&str>,
    author: &Author,
) -> Result<ExecutedStack, StackingError> {
    let safety_branch = format!("newpr/stack-source/pr-{pr_number}");
    store
        .update_ref(&safety_branch, None, &ctx.head_sha)
        .await
        .map_err(|e| StackingError::RefWriteFailure {
            r#ref: safety_branch.clone(),
            cause: e.to_string(),
        })?;

    let base_commit = store.read_commit(&ctx.base_sha).await?;
    let mut commit_shas: std::collections::BTreeMap<String, ObjectHash> = std::collections::BTreeMap::new();
    let mut tree_shas: std::collections::BTreeMap<String, ObjectHash> = std::collections::BTreeMap::new();
    let mut group_commits = Vec::with_capacity(plan.groups.len());

    for (idx, group) in plan.groups.iter().enumerate() {
        let parent_trees: Vec<ObjectHash> = if group.parents.is_empty() {
            vec![base_commit.tree_id]
        } else {
            group.parents.iter().map(|p| tree_shas[p]).collect()
        };
        let parent_shas: Vec<ObjectHash> = if group.parents.is_empty() {
            vec![ctx.base_sha]
        } else {
            group.parents.iter().map(|p| commit_shas[p]).collect()
        };

        let message = pr_title.unwrap_or(&group.id).to_string() + &trailer(pr_number, &group.id);

        let (commit_id, tree_id) = commit_group(
            store,
            &parent_trees,
            group,
            &parent_shas,
            author,
            group.max_delta_date,
            &message,
        )
        .await?;

        let name = branch_name(pr_number, idx, &commit_id);
        store
            .update_ref(&name, None, &commit_id)
            .await
            .map_err(|e| StackingError::RefWriteFailure {
                r#ref: name.clone(),
                cause: e.to_string(),
            })?;

        commit_shas.insert(group.id.clone(), commit_id);
        tree_shas.insert(group.id.clone(), tree_id);
        group_commits.push(ExecutedGroupCommit {
            group_id: group.id.clone(),
            branch_name: name,
            commit_sha: commit_id,
            parent_shas,
        });
    }

    let (merge_commit, final_tree_sha) = if plan.leaves.len() <= 1 {
        let only_leaf = plan.leaves.first().cloned().unwrap_or_else(|| plan.topo_order.last().cloned().unwrap_or_default());
        let tree = tree_shas.get(&only_leaf).copied().unwrap_or(base_commit.tree_id);
        (None, tree)
    } else {
        let leaf_parent_trees: Vec<ObjectHash> = plan.leaves.iter().map(|id| tree_shas[id]).collect();
        let leaf_parent_shas: Vec<ObjectHash> = plan.leaves.iter().map(|id| commit_shas[id]).collect();

        let index = union_tree_index(store, &leaf_parent_trees).await?;
        let (tree_id, trees) = index.build()?;
        if tree_id != plan.final_tree {
            return Err(StackingError::TreeMismatch {
                group: "__merge__".to_string(),
                expected: plan.final_tree,
                actual: tree_id,
                diff_summary: format!("{} intermediate tree objects rebuilt while joining {} leaves", trees.len(), plan.leaves.len()),
            });
        }
        for tree in &trees {
            store.write_tree(tree).await?;
        }
        let message = format!(
            "{}{}",
            pr_title.unwrap_or("Merge stacked groups"),
            trailer(pr_number, "__merge__")
        );
        let commit = Commit::from_tree_id(
            tree_id,
            leaf_parent_shas.clone(),
            author,
            plan.groups.iter().map(|g| g.max_delta_date).max().unwrap_or(0),
            0,
            &message,
        );
        store.write_commit(&commit).await?;
        let name = format!("newpr-stack/pr-{pr_number}/merge");
        store
            .update_ref(&name, None, &commit.id)
            .await
            .map_err(|e| StackingError::RefWriteFailure {
                r#ref: name.clone(),
                cause: e.to_string(),
            })?;
        (
            Some(ExecutedGroupCommit {
                group_id: "__merge__".to_string(),
                branch_name: name,
                commit_sha: commit.id,
                parent_shas: leaf_parent_shas,
            }),
            tree_id,
        )
    };

    Ok(ExecutedStack {
        group_commits,
        merge_commit,
        final_tree_sha,
        source_copy_branch: safety_branch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_names_are_stable_for_same_commit_id() {
        let auth = ObjectHash::new(b"auth-commit");
        let ui = ObjectHash::new(b"ui-commit");
        assert_eq!(branch_name(42, 0, &auth), branch_name(42, 0, &auth));
        assert_ne!(branch_name(42, 0, &auth), branch_name(42, 0, &ui));
    }

    #[test]
    fn branch_names_are_unpadded_by_index() {
        let commit = ObjectHash::new(b"some-commit");
        assert!(branch_name(42, 0, &commit).starts_with("newpr-stack/pr-42/0-"));
        assert!(branch_name(42, 1, &commit).starts_with("newpr-stack/pr-42/1-"));
    }
}
