//! C2 — Delta Extraction: walk the first-parent path from base (exclusive) to head (inclusive),
//! diffing each commit's tree against its first parent's to produce one [`Delta`] per commit.

use std::path::{Path, PathBuf};

use crate::delta::encode::DeltaDiff;
use crate::hash::ObjectHash;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;
use crate::stacking::model::{ChangeStatus, Context, Delta, FileChange};
use crate::stacking::treewalk::{PathMap, flatten_tree};

/// Blobs at or above this similarity ratio, between a deleted path and an added path sharing a
/// basename, are treated as a rename rather than an independent delete+add. Chosen as a
/// deliberately documented threshold (spec leaves the exact cutoff to the implementer).
const RENAME_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Ordered, oldest-first list of commits strictly after `base` (exclusive) up to and including
/// `head`, following first-parent links only.
async fn first_parent_chain(
    store: &dyn ObjectStore,
    base: ObjectHash,
    head: ObjectHash,
) -> Result<Vec<ObjectHash>, StackingError> {
    let mut chain = Vec::new();
    let mut current = head;
    loop {
        if current == base {
            break;
        }
        chain.push(current);
        let commit = store
            .read_commit(&current)
            .await
            .map_err(|e| StackingError::UnparseableCommit {
                sha: current,
                cause: e.to_string(),
            })?;
        match commit.parent_commit_ids.first() {
            Some(parent) => current = *parent,
            None => break,
        }
    }
    chain.reverse();
    Ok(chain)
}

fn basename(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or_default()
}

fn is_binary(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_err()
}

/// Compares two blobs' content and returns whether they look like the same file renamed, using
/// the Myers-diff-based similarity ratio. Binary blobs skip similarity scoring entirely and are
/// never treated as renames of each other (documented open-question resolution).
async fn looks_like_rename(
    store: &dyn ObjectStore,
    old_blob: ObjectHash,
    new_blob: ObjectHash,
) -> Result<bool, StackingError> {
    if old_blob == new_blob {
        return Ok(true);
    }
    let old = store.read_blob(&old_blob).await?;
    let new = store.read_blob(&new_blob).await?;
    if is_binary(&old.data) || is_binary(&new.data) {
        return Ok(false);
    }
    let diff = DeltaDiff::new(&old.data, &new.data);
    Ok(diff.get_ssam_rate() >= RENAME_SIMILARITY_THRESHOLD)
}

/// Diffs `old_paths` against `new_paths`, folding rename detection (same basename, similar
/// content) into a single `Renamed` change instead of an independent delete+add pair.
async fn diff_trees(
    store: &dyn ObjectStore,
    old_paths: &PathMap,
    new_paths: &PathMap,
) -> Result<Vec<FileChange>, StackingError> {
    let mut deleted: Vec<PathBuf> = Vec::new();
    let mut added: Vec<PathBuf> = Vec::new();
    let mut modified: Vec<FileChange> = Vec::new();

    for (path, (old_mode, old_id)) in old_paths {
        match new_paths.get(path) {
            None => deleted.push(path.clone()),
            Some((new_mode, new_id)) if new_id != old_id || new_mode != old_mode => {
                modified.push(FileChange {
                    path: path.clone(),
                    old_path: None,
                    status: ChangeStatus::Modified,
                    new_blob_id: Some(*new_id),
                    new_mode: Some(*new_mode),
                    old_blob_id: Some(*old_id),
                });
            }
            Some(_) => {}
        }
    }
    for path in new_paths.keys() {
        if !old_paths.contains_key(path) {
            added.push(path.clone());
        }
    }

    let mut renamed_from: Vec<bool> = vec![false; deleted.len()];
    let mut changes = Vec::new();

    for add_path in added.iter() {
        let (new_mode, new_id) = new_paths[add_path];
        let mut matched = None;
        for (d_idx, del_path) in deleted.iter().enumerate() {
            if renamed_from[d_idx] {
                continue;
            }
            if basename(del_path) != basename(add_path) {
                continue;
            }
            let (_, old_id) = old_paths[del_path];
            if looks_like_rename(store, old_id, new_id).await? {
                matched = Some((d_idx, old_id));
                break;
            }
        }
        if let Some((d_idx, old_id)) = matched {
            renamed_from[d_idx] = true;
            changes.push(FileChange {
                path: add_path.clone(),
                old_path: Some(deleted[d_idx].clone()),
                status: ChangeStatus::Renamed,
                new_blob_id: Some(new_id),
                new_mode: Some(new_mode),
                old_blob_id: Some(old_id),
            });
        } else {
            changes.push(FileChange {
                path: add_path.clone(),
                old_path: None,
                status: ChangeStatus::Added,
                new_blob_id: Some(new_id),
                new_mode: Some(new_mode),
                old_blob_id: None,
            });
        }
    }

    for (d_idx, del_path) in deleted.iter().enumerate() {
        if renamed_from[d_idx] {
            continue;
        }
        let (old_mode, old_id) = old_paths[del_path];
        changes.push(FileChange {
            path: del_path.clone(),
            old_path: None,
            status: ChangeStatus::Deleted,
            new_blob_id: None,
            new_mode: Some(old_mode),
            old_blob_id: Some(old_id),
        });
    }

    changes.extend(modified);
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(changes)
}

/// Enumerates one [`Delta`] per commit on the first-parent path from `ctx.base_sha` (exclusive)
/// to `ctx.head_sha` (inclusive), ordered by commit date ascending with ties broken by the walk
/// order (which is itself the parent traversal order).
pub async fn extract_deltas(
    store: &dyn ObjectStore,
    ctx: &Context,
) -> Result<Vec<Delta>, StackingError> {
    let chain = first_parent_chain(store, ctx.base_sha, ctx.head_sha).await?;

    let mut deltas = Vec::with_capacity(chain.len());
    for sha in chain {
        let commit = store
            .read_commit(&sha)
            .await
            .map_err(|e| StackingError::UnparseableCommit {
                sha,
                cause: e.to_string(),
            })?;
        let new_paths = flatten_tree(store, commit.tree_id).await?;
        let old_paths = match commit.parent_commit_ids.first() {
            Some(parent) => {
                let parent_commit = store.read_commit(parent).await?;
                flatten_tree(store, parent_commit.tree_id).await?
            }
            None => PathMap::new(),
        };
        let changes = diff_trees(store, &old_paths, &new_paths).await?;
        deltas.push(Delta {
            sha,
            date: commit.committer.timestamp,
            changes,
        });
    }

    deltas.sort_by_key(|d| d.date);
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};
    use crate::internal::object::ObjectTrait;
    use crate::internal::object::blob::Blob;
    use crate::internal::object::commit::Commit;
    use crate::internal::object::signature::Author;
    use crate::internal::object::tree::{Tree, TreeItem};
    use crate::repository::MemoryRepository;

    fn commit_at(
        tree_id: ObjectHash,
        parents: Vec<ObjectHash>,
        timestamp: i64,
        message: &str,
    ) -> Commit {
        let author = Author {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        };
        Commit::from_tree_id(tree_id, parents, &author, timestamp, 0, message)
    }

    #[tokio::test]
    async fn extracts_added_and_modified_files_in_order() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();

        let readme = Blob::from_content(b"hello\n".to_vec());
        repo.seed_blob(&readme);
        let base_tree = Tree::from_tree_items(vec![TreeItem::new(
            TreeItemMode::Blob,
            readme.id,
            "README.md".to_string(),
        )])
        .unwrap();
        repo.seed_tree(&base_tree).unwrap();
        let base_commit = commit_at(base_tree.id, vec![], 1000, "base");
        repo.seed_commit(&base_commit).unwrap();

        let auth = Blob::from_content(b"export const auth = true;\n".to_vec());
        repo.seed_blob(&auth);
        let mid_tree = Tree::from_tree_items(vec![
            TreeItem::new(TreeItemMode::Blob, readme.id, "README.md".to_string()),
            TreeItem::new(TreeItemMode::Blob, auth.id, "src/auth.ts".to_string()),
        ])
        .unwrap();
        repo.seed_tree(&mid_tree).unwrap();
        let mid_commit = commit_at(mid_tree.id, vec![base_commit.id], 2000, "add auth");
        repo.seed_commit(&mid_commit).unwrap();

        let ctx = Context {
            repo_path: "/tmp".into(),
            base_sha: base_commit.id,
            head_sha: mid_commit.id,
        };
        let deltas = extract_deltas(&repo, &ctx).await.unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].changes.len(), 1);
        assert_eq!(deltas[0].changes[0].path, PathBuf::from("src/auth.ts"));
        assert_eq!(deltas[0].changes[0].status, ChangeStatus::Added);
    }

    #[tokio::test]
    async fn detects_deletion() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();

        let a = Blob::from_content(b"a\n".to_vec());
        let b = Blob::from_content(b"b\n".to_vec());
        repo.seed_blob(&a);
        repo.seed_blob(&b);
        let base_tree = Tree::from_tree_items(vec![
            TreeItem::new(TreeItemMode::Blob, a.id, "a.ts".to_string()),
            TreeItem::new(TreeItemMode::Blob, b.id, "b.ts".to_string()),
        ])
        .unwrap();
        repo.seed_tree(&base_tree).unwrap();
        let base_commit = commit_at(base_tree.id, vec![], 1000, "base");
        repo.seed_commit(&base_commit).unwrap();

        let head_tree =
            Tree::from_tree_items(vec![TreeItem::new(TreeItemMode::Blob, a.id, "a.ts".to_string())])
                .unwrap();
        repo.seed_tree(&head_tree).unwrap();
        let head_commit = commit_at(head_tree.id, vec![base_commit.id], 2000, "delete b");
        repo.seed_commit(&head_commit).unwrap();

        let ctx = Context {
            repo_path: "/tmp".into(),
            base_sha: base_commit.id,
            head_sha: head_commit.id,
        };
        let deltas = extract_deltas(&repo, &ctx).await.unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].changes[0].status, ChangeStatus::Deleted);
        assert_eq!(deltas[0].changes[0].path, PathBuf::from("b.ts"));
    }
}
