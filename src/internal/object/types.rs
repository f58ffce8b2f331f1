//! Object type enumeration shared by blob/tree/commit parsing and the zlib framing layer.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// In Git, each object type is assigned a unique integer value, which is used to identify the
/// type of the object in a Git repository.
///
/// * `Commit` (1): a snapshot of the project plus author/committer/parent metadata.
/// * `Tree` (2): a directory listing of named entries pointing at blobs/trees.
/// * `Blob` (3): the raw content of a single file.
///
/// This engine only ever reads and writes loose objects of these three kinds; it never
/// constructs packs, so delta/offset object types have no representation here.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit = 1,
    Tree,
    Blob,
}

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Blob => write!(f, "blob"),
        }
    }
}

impl ObjectType {
    /// Returns the ASCII header keyword used by the loose-object framing (`"<type> <size>\0"`).
    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
        }
    }

    /// Parses a string representation of a Git object type.
    pub fn from_string(s: &str) -> Result<ObjectType, GitError> {
        match s {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(GitError::InvalidObjectType(s.to_string())),
        }
    }

    /// Convert an object type to its ASCII header keyword as an owned byte vector.
    pub fn to_data(self) -> Result<Vec<u8>, GitError> {
        Ok(self.to_bytes().to_vec())
    }

    /// Convert an object type to a number.
    pub fn to_u8(&self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
        }
    }

    /// Convert a number to an object type.
    pub fn from_u8(number: u8) -> Result<ObjectType, GitError> {
        match number {
            1 => Ok(ObjectType::Commit),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Blob),
            _ => Err(GitError::InvalidObjectType(format!(
                "Invalid object type number: {number}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ObjectType;

    #[test]
    fn test_object_type_to_bytes() {
        assert_eq!(ObjectType::Blob.to_bytes(), b"blob");
        assert_eq!(ObjectType::Tree.to_bytes(), b"tree");
        assert_eq!(ObjectType::Commit.to_bytes(), b"commit");
    }

    #[test]
    fn test_object_type_from_string() {
        assert_eq!(ObjectType::from_string("blob").unwrap(), ObjectType::Blob);
        assert_eq!(ObjectType::from_string("tree").unwrap(), ObjectType::Tree);
        assert_eq!(
            ObjectType::from_string("commit").unwrap(),
            ObjectType::Commit
        );
        assert!(ObjectType::from_string("invalid_type").is_err());
    }

    #[test]
    fn test_object_type_roundtrip_u8() {
        for ty in [ObjectType::Commit, ObjectType::Tree, ObjectType::Blob] {
            assert_eq!(ObjectType::from_u8(ty.to_u8()).unwrap(), ty);
        }
        assert!(ObjectType::from_u8(9).is_err());
    }
}
