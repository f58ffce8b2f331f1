//! The Blob object stores the raw content of a single file, with no metadata of its own —
//! filename, mode, and executable bit all live in the parent [`Tree`](super::tree::Tree) entry.

use std::fmt::Display;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::ObjectType;

#[derive(Eq, Debug, Clone, Serialize, Deserialize, Decode, Encode)]
pub struct Blob {
    pub id: ObjectHash,
    pub data: Vec<u8>,
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Blob({}, {} bytes)", self.id, self.data.len())
    }
}

impl Blob {
    /// Builds a blob from raw file content, computing its object hash.
    pub fn from_content(data: Vec<u8>) -> Self {
        let id = ObjectHash::from_type_and_data(ObjectType::Blob, &data);
        Blob { id, data }
    }
}

impl ObjectTrait for Blob {
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        Ok(Blob {
            id: hash,
            data: data.to_vec(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn get_size(&self) -> usize {
        self.data.len()
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};

    #[test]
    fn hash_matches_from_type_and_data() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let blob = Blob::from_content(b"hello\n".to_vec());
        assert_eq!(
            blob.id,
            ObjectHash::from_type_and_data(ObjectType::Blob, b"hello\n")
        );
    }

    #[test]
    fn roundtrips_through_bytes() {
        let _guard = set_hash_kind_for_test(HashKind::Sha1);
        let blob = Blob::from_content(b"content".to_vec());
        let parsed = Blob::from_bytes(&blob.data, blob.id).unwrap();
        assert_eq!(parsed, blob);
        assert_eq!(parsed.data, b"content");
    }
}
