//! C9 — Verifier: confirms the executed stack reproduces the original head tree bit-for-bit, and
//! runs a handful of cheap structural sanity checks over the refs the executor wrote.

use std::collections::BTreeSet;

use crate::diff::Diff;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;
use crate::stacking::model::{Context, DagPlan, ExecutedStack};
use crate::stacking::treewalk::flatten_tree;

/// Compares the final executed tree against `ctx.head_sha`'s tree path-by-path, returning the
/// differing paths (empty on success) rather than failing fast, so a caller gets a complete
/// diagnostic instead of the first mismatch.
async fn differing_paths(
    store: &dyn ObjectStore,
    expected_tree: crate::hash::ObjectHash,
    actual_tree: crate::hash::ObjectHash,
) -> Result<Vec<String>, StackingError> {
    if expected_tree == actual_tree {
        return Ok(Vec::new());
    }
    let expected = flatten_tree(store, expected_tree).await?;
    let actual = flatten_tree(store, actual_tree).await?;

    let mut diffs = Vec::new();
    let all_paths: BTreeSet<_> = expected.keys().chain(actual.keys()).collect();
    for path in all_paths {
        match (expected.get(path), actual.get(path)) {
            (Some(e), Some(a)) if e != a => diffs.push(path.display().to_string()),
            (Some(_), None) => diffs.push(format!("{} (missing in stack)", path.display())),
            (None, Some(_)) => diffs.push(format!("{} (unexpected in stack)", path.display())),
            _ => {}
        }
    }
    Ok(diffs)
}

/// Verifies the structural invariants of a completed run: final tree matches head, every group's
/// parent refs resolved to something that exists, and the topo order visits every planned group
/// exactly once.
pub async fn verify(
    store: &dyn ObjectStore,
    ctx: &Context,
    plan: &DagPlan,
    executed: &ExecutedStack,
) -> Result<(), StackingError> {
    let head_commit = store.read_commit(&ctx.head_sha).await?;
    let diffs = differing_paths(store, head_commit.tree_id, executed.final_tree_sha).await?;
    if !diffs.is_empty() {
        return Err(StackingError::VerifyMismatch {
            expected: head_commit.tree_id,
            actual: executed.final_tree_sha,
            differing_paths: diffs,
        });
    }

    let planned_ids: BTreeSet<&str> = plan.groups.iter().map(|g| g.id.as_str()).collect();
    let topo_ids: BTreeSet<&str> = plan.topo_order.iter().map(|s| s.as_str()).collect();
    if planned_ids != topo_ids {
        return Err(StackingError::VerifyMismatch {
            expected: head_commit.tree_id,
            actual: executed.final_tree_sha,
            differing_paths: vec!["topo_order does not cover every planned group exactly once".to_string()],
        });
    }

    for commit in executed.group_commits.iter().chain(executed.merge_commit.iter()) {
        if !store.has_object(&commit.commit_sha).await? {
            return Err(StackingError::VerifyMismatch {
                expected: head_commit.tree_id,
                actual: executed.final_tree_sha,
                differing_paths: vec![format!("commit for group {} was never written", commit.group_id)],
            });
        }
        for parent in &commit.parent_shas {
            if !store.has_object(parent).await? {
                return Err(StackingError::VerifyMismatch {
                    expected: head_commit.tree_id,
                    actual: executed.final_tree_sha,
                    differing_paths: vec![format!(
                        "group {} references a parent commit that doesn't exist",
                        commit.group_id
                    )],
                });
            }
        }
    }

    if plan.leaves.len() > 1 && executed.merge_commit.is_none() {
        return Err(StackingError::VerifyMismatch {
            expected: head_commit.tree_id,
            actual: executed.final_tree_sha,
            differing_paths: vec!["plan has multiple leaves but no merge commit was executed".to_string()],
        });
    }

    Ok(())
}

/// Renders a human-readable diff for a single mismatched path, reusing the same line-diff engine
/// the rest of the toolchain uses for patch output. Blobs are fetched up front so the formatter
/// itself can stay synchronous.
pub async fn explain_mismatch(
    store: &dyn ObjectStore,
    path: &std::path::Path,
    expected_blob: crate::hash::ObjectHash,
    actual_blob: crate::hash::ObjectHash,
) -> Result<String, StackingError> {
    let expected = store.read_blob(&expected_blob).await?;
    let actual = store.read_blob(&actual_blob).await?;

    let path_buf = path.to_path_buf();
    let old_blobs: std::collections::HashMap<_, _> = [(path_buf.clone(), expected_blob)].into_iter().collect();
    let new_blobs: std::collections::HashMap<_, _> = [(path_buf.clone(), actual_blob)].into_iter().collect();
    let bytes: std::collections::HashMap<crate::hash::ObjectHash, Vec<u8>> =
        [(expected_blob, expected.data), (actual_blob, actual.data)].into_iter().collect();

    Ok(Diff::diff_for_file_string(&path_buf, &old_blobs, &new_blobs, &|_, hash| {
        bytes.get(hash).cloned().unwrap_or_default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};
    use crate::internal::object::blob::Blob;
    use crate::internal::object::tree::{Tree, TreeItem, TreeItemMode};
    use crate::repository::MemoryRepository;

    #[tokio::test]
    async fn identical_trees_produce_no_diffs() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let blob = Blob::from_content(b"x\n".to_vec());
        repo.seed_blob(&blob);
        let tree =
            Tree::from_tree_items(vec![TreeItem::new(TreeItemMode::Blob, blob.id, "a.ts".to_string())]).unwrap();
        repo.seed_tree(&tree).unwrap();

        let diffs = differing_paths(&repo, tree.id, tree.id).await.unwrap();
        assert!(diffs.is_empty());
    }
}
