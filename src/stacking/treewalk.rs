//! Shared helper for flattening a tree object into a path-keyed map, used wherever a phase needs
//! "every path reachable from this tree" without walking the hierarchy itself. Async counterpart
//! to [`crate::internal::index::TreeIndex::from_tree`], which takes a synchronous callback and so
//! can't read through an [`ObjectStore`] directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hash::ObjectHash;
use crate::internal::index::TreeIndex;
use crate::internal::object::tree::TreeItemMode;
use crate::repository::ObjectStore;
use crate::stacking::errors::StackingError;

pub type PathMap = BTreeMap<PathBuf, (TreeItemMode, ObjectHash)>;

fn walk<'a>(
    store: &'a dyn ObjectStore,
    id: &'a ObjectHash,
    prefix: &'a Path,
    out: &'a mut PathMap,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StackingError>> + 'a>> {
    Box::pin(async move {
        let tree = store.read_tree(id).await?;
        for item in tree.tree_items {
            let path = prefix.join(&item.name);
            if item.mode.is_tree() {
                walk(store, &item.id, &path, out).await?;
            } else {
                out.insert(path, (item.mode, item.id));
            }
        }
        Ok(())
    })
}

/// Flattens every blob/gitlink entry reachable from `root` into a single path-keyed map.
pub async fn flatten_tree(store: &dyn ObjectStore, root: ObjectHash) -> Result<PathMap, StackingError> {
    let mut out = PathMap::new();
    walk(store, &root, Path::new(""), &mut out).await?;
    Ok(out)
}

/// Like [`flatten_tree`], but wraps the result in a [`TreeIndex`] ready for further mutation
/// (insert/remove) before being rebuilt into new `Tree` objects.
pub async fn tree_index_from_root(
    store: &dyn ObjectStore,
    root: ObjectHash,
) -> Result<TreeIndex, StackingError> {
    let flat = flatten_tree(store, root).await?;
    let mut index = TreeIndex::new();
    for (path, (mode, id)) in flat {
        index.insert(path, mode, id);
    }
    Ok(index)
}
