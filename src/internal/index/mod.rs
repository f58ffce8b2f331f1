//! A path-keyed, in-memory index of "what should this tree contain", used by the plan executor
//! to materialize one new tree object per commit without ever touching a working-tree checkout.
//!
//! Conceptually this plays the role Git's own index (`.git/index`) plays for `git commit`: a
//! flat map of path → (mode, blob/tree hash) that gets folded back into a hierarchy of `Tree`
//! objects. Unlike the real index, entries here are always fully resolved (no staged/unstaged
//! distinction) since the engine never runs a working-tree diff.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::tree::{Tree, TreeItem, TreeItemMode};

/// A flat, path-keyed view of a tree's final contents.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: BTreeMap<PathBuf, (TreeItemMode, ObjectHash)>,
}

impl TreeIndex {
    pub fn new() -> Self {
        TreeIndex {
            entries: BTreeMap::new(),
        }
    }

    /// Seeds the index by recursively walking an existing tree, resolving subtrees through
    /// `read_tree`. Used to start from the PR's base tree before applying a group's changes.
    pub fn from_tree(
        tree: &Tree,
        read_tree: &mut dyn FnMut(&ObjectHash) -> Result<Tree, GitError>,
    ) -> Result<Self, GitError> {
        let mut index = TreeIndex::new();
        index.absorb_tree(Path::new(""), tree, read_tree)?;
        Ok(index)
    }

    fn absorb_tree(
        &mut self,
        prefix: &Path,
        tree: &Tree,
        read_tree: &mut dyn FnMut(&ObjectHash) -> Result<Tree, GitError>,
    ) -> Result<(), GitError> {
        for item in &tree.tree_items {
            let path = prefix.join(&item.name);
            if item.mode.is_tree() {
                let subtree = read_tree(&item.id)?;
                self.absorb_tree(&path, &subtree, read_tree)?;
            } else {
                self.entries.insert(path, (item.mode, item.id));
            }
        }
        Ok(())
    }

    /// Sets (or overwrites) a single path's mode and blob/gitlink hash.
    pub fn insert(&mut self, path: PathBuf, mode: TreeItemMode, id: ObjectHash) {
        self.entries.insert(path, (mode, id));
    }

    /// Removes a path. A no-op if the path is absent.
    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Renames a path, preserving its mode and hash. A no-op if `from` is absent.
    pub fn rename(&mut self, from: &Path, to: PathBuf) {
        if let Some(entry) = self.entries.remove(from) {
            self.entries.insert(to, entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Folds the flat path map back into a hierarchy of `Tree` objects, returning the root
    /// tree's hash and every `Tree` (root plus all subtrees) that must be written to the
    /// object store, in an order safe to write sequentially (children before parents).
    pub fn build(&self) -> Result<(ObjectHash, Vec<Tree>), GitError> {
        if self.entries.is_empty() {
            return Err(GitError::EmptyTreeItems(
                "cannot materialize a tree with no surviving paths".to_string(),
            ));
        }
        let mut written = Vec::new();
        let root_id = Self::build_level(&self.entries, Path::new(""), &mut written)?;
        Ok((root_id, written))
    }

    /// Builds the tree for one directory level: partitions entries into ones that live
    /// directly in this directory and ones nested under an immediate subdirectory, recurses
    /// for the latter, then emits this level's `Tree`.
    fn build_level(
        entries: &BTreeMap<PathBuf, (TreeItemMode, ObjectHash)>,
        prefix: &Path,
        written: &mut Vec<Tree>,
    ) -> Result<ObjectHash, GitError> {
        let mut direct: Vec<TreeItem> = Vec::new();
        let mut subdirs: BTreeMap<String, BTreeMap<PathBuf, (TreeItemMode, ObjectHash)>> =
            BTreeMap::new();

        for (path, (mode, id)) in entries {
            let relative = path
                .strip_prefix(prefix)
                .map_err(|_| GitError::InvalidPathError(path.display().to_string()))?;
            let mut components = relative.components();
            let first = components
                .next()
                .ok_or_else(|| GitError::InvalidPathError(path.display().to_string()))?;
            let name = first.as_os_str().to_string_lossy().to_string();

            if components.clone().next().is_none() {
                direct.push(TreeItem::new(*mode, *id, name));
            } else {
                subdirs
                    .entry(name)
                    .or_default()
                    .insert(path.clone(), (*mode, *id));
            }
        }

        for (name, sub_entries) in subdirs {
            let sub_prefix = prefix.join(&name);
            let sub_id = Self::build_level(&sub_entries, &sub_prefix, written)?;
            direct.push(TreeItem::new(TreeItemMode::Tree, sub_id, name));
        }

        let tree = Tree::from_tree_items(direct)?;
        let root_id = tree.id;
        written.push(tree);
        Ok(root_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};

    fn blob_hash(seed: u8) -> ObjectHash {
        ObjectHash::new(&[seed])
    }

    #[test]
    fn builds_nested_hierarchy() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let mut index = TreeIndex::new();
        index.insert(
            PathBuf::from("README.md"),
            TreeItemMode::Blob,
            blob_hash(1),
        );
        index.insert(
            PathBuf::from("src/lib.rs"),
            TreeItemMode::Blob,
            blob_hash(2),
        );
        index.insert(
            PathBuf::from("src/util/mod.rs"),
            TreeItemMode::Blob,
            blob_hash(3),
        );

        let (root_id, trees) = index.build().unwrap();
        // src/util, src, and the root: three trees total.
        assert_eq!(trees.len(), 3);
        assert_eq!(trees.last().unwrap().id, root_id);

        let root = trees.last().unwrap();
        let names: Vec<&str> = root.tree_items.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"README.md"));
        assert!(names.contains(&"src"));
    }

    #[test]
    fn remove_then_build_drops_path() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let mut index = TreeIndex::new();
        index.insert(PathBuf::from("a.txt"), TreeItemMode::Blob, blob_hash(1));
        index.insert(PathBuf::from("b.txt"), TreeItemMode::Blob, blob_hash(2));
        index.remove(Path::new("a.txt"));

        let (_, trees) = index.build().unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].tree_items.len(), 1);
        assert_eq!(trees[0].tree_items[0].name, "b.txt");
    }

    #[test]
    fn empty_index_is_rejected() {
        let index = TreeIndex::new();
        assert!(index.build().is_err());
    }
}
