//! The Tree object represents a directory listing: a sorted set of named entries, each pointing
//! at a blob (file), another tree (subdirectory), or a commit (submodule gitlink).

use std::fmt::Display;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::ObjectType;

/// Git file mode for a tree entry. Octal values match what `git cat-file -p` prints.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Decode, Encode)]
pub enum TreeItemMode {
    /// 100644: regular, non-executable file.
    Blob,
    /// 100755: regular, executable file.
    BlobExecutable,
    /// 040000: subdirectory (another tree).
    Tree,
    /// 120000: symbolic link, target stored as the blob content.
    Link,
    /// 160000: submodule gitlink; the hash is the submodule's commit, not a blob.
    Commit,
}

impl TreeItemMode {
    pub fn to_bytes(self) -> &'static [u8] {
        match self {
            TreeItemMode::Blob => b"100644",
            TreeItemMode::BlobExecutable => b"100755",
            TreeItemMode::Tree => b"40000",
            TreeItemMode::Link => b"120000",
            TreeItemMode::Commit => b"160000",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GitError> {
        match bytes {
            b"100644" | b"100664" | b"100640" => Ok(TreeItemMode::Blob),
            b"100755" => Ok(TreeItemMode::BlobExecutable),
            b"40000" | b"040000" => Ok(TreeItemMode::Tree),
            b"120000" => Ok(TreeItemMode::Link),
            b"160000" => Ok(TreeItemMode::Commit),
            _ => Err(GitError::InvalidTreeItem(format!(
                "unrecognized tree entry mode: {}",
                String::from_utf8_lossy(bytes)
            ))),
        }
    }

    /// Whether this entry is itself a tree (subdirectory), as opposed to a blob or gitlink.
    pub fn is_tree(self) -> bool {
        matches!(self, TreeItemMode::Tree)
    }
}

impl Display for TreeItemMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.to_bytes()))
    }
}

/// A single named entry in a [`Tree`].
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Decode, Encode)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub id: ObjectHash,
    pub name: String,
}

impl TreeItem {
    pub fn new(mode: TreeItemMode, id: ObjectHash, name: String) -> Self {
        TreeItem { mode, id, name }
    }

    /// Git's tree entry sort key: compares names as if a subtree's name had a trailing `/`, so
    /// that e.g. `"lib"` (a blob) sorts before `"lib-utils"` but `"lib/"` (a tree) sorts after it.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.clone().into_bytes();
        if self.mode.is_tree() {
            key.push(b'/');
        }
        key
    }
}

/// A directory listing: an ordered set of [`TreeItem`]s, serialized in Git's canonical sort order.
#[derive(Eq, Debug, Clone, Serialize, Deserialize, Decode, Encode)]
pub struct Tree {
    pub id: ObjectHash,
    pub tree_items: Vec<TreeItem>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for item in &self.tree_items {
            writeln!(f, "{} {} {}", item.mode, item.id, item.name)?;
        }
        Ok(())
    }
}

impl Tree {
    /// Builds a `Tree` from an unordered set of entries, sorting them into Git's canonical
    /// order and computing the resulting object hash. Fails if the entry list is empty, since
    /// an empty tree can't be represented by this engine's path-keyed index (use a deletion of
    /// the parent entry instead of an empty subtree).
    pub fn from_tree_items(mut tree_items: Vec<TreeItem>) -> Result<Self, GitError> {
        if tree_items.is_empty() {
            return Err(GitError::EmptyTreeItems(
                "cannot build a tree with zero entries".to_string(),
            ));
        }
        tree_items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut tree = Tree {
            id: ObjectHash::default(),
            tree_items,
        };
        let hash = ObjectHash::from_type_and_data(ObjectType::Tree, &tree.to_data()?);
        tree.id = hash;
        Ok(tree)
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let mut items = Vec::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let space = cursor
                .iter()
                .position(|&b| b == b' ')
                .ok_or(GitError::InvalidTreeObject)?;
            let mode = TreeItemMode::from_bytes(&cursor[..space])?;

            let nul = cursor[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(GitError::InvalidTreeObject)?
                + space
                + 1;
            let name = String::from_utf8(cursor[space + 1..nul].to_vec())
                .map_err(|e| GitError::ConversionError(e.to_string()))?;

            let hash_size = crate::hash::get_hash_kind().size();
            let hash_start = nul + 1;
            let hash_end = hash_start + hash_size;
            if cursor.len() < hash_end {
                return Err(GitError::InvalidTreeObject);
            }
            let id = ObjectHash::from_bytes(&cursor[hash_start..hash_end])
                .map_err(GitError::InvalidHashValue)?;

            items.push(TreeItem::new(mode, id, name));
            cursor = &cursor[hash_end..];
        }

        Ok(Tree {
            id: hash,
            tree_items: items,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        0
    }

    /// [Git-Internals-Git-Objects](https://git-scm.com/book/en/v2/Git-Internals-Git-Objects)
    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        for item in &self.tree_items {
            data.extend(item.mode.to_bytes());
            data.push(b' ');
            data.extend(item.name.as_bytes());
            data.push(0);
            data.extend(item.id.as_ref());
        }
        Ok(data)
    }
}

impl FromStr for TreeItemMode {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TreeItemMode::from_bytes(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};

    fn hash(seed: u8) -> ObjectHash {
        ObjectHash::new(&[seed])
    }

    #[test]
    fn sorts_entries_git_style() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let items = vec![
            TreeItem::new(TreeItemMode::Tree, hash(1), "lib".to_string()),
            TreeItem::new(TreeItemMode::Blob, hash(2), "lib-utils.rs".to_string()),
            TreeItem::new(TreeItemMode::Blob, hash(3), "README.md".to_string()),
        ];
        let tree = Tree::from_tree_items(items).unwrap();
        let names: Vec<&str> = tree.tree_items.iter().map(|i| i.name.as_str()).collect();
        // "lib-utils.rs" < "lib/" < "README.md" is false lexically, but git's rule puts
        // "lib-utils.rs" before "lib/" because '-' (0x2d) < '/' (0x2f).
        assert_eq!(names, vec!["README.md", "lib-utils.rs", "lib"]);
    }

    #[test]
    fn roundtrips_through_bytes() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let items = vec![
            TreeItem::new(TreeItemMode::Blob, hash(9), "a.txt".to_string()),
            TreeItem::new(TreeItemMode::Tree, hash(10), "sub".to_string()),
        ];
        let tree = Tree::from_tree_items(items).unwrap();
        let data = tree.to_data().unwrap();
        let parsed = Tree::from_bytes(&data, tree.id).unwrap();
        assert_eq!(parsed.tree_items, tree.tree_items);
    }

    #[test]
    fn rejects_empty_tree() {
        assert!(Tree::from_tree_items(Vec::new()).is_err());
    }
}
