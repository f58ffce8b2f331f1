//! Object model definitions for Git blobs, trees, commits, and the signature/type values they
//! share. Everything the stacking pipeline touches — reading the starting tree, materializing
//! new trees, and stamping new commits — goes through this module.
//!
//! Pipeline overview, phase by phase:
//!
//! 1. Context capture resolves the PR's base and head commits and loads their trees.
//! 2. Delta extraction diffs base/head trees into per-file changes, using the blob/tree types
//!    here to compare content and detect renames.
//! 3. Symbol-flow analysis and partitioning group those changes without touching objects.
//! 4. The plan builder and executor use [`tree::Tree`], [`blob::Blob`], and [`commit::Commit`]
//!    to materialize one new tree and commit object per group, via the index in
//!    [`crate::internal::index`].
//! 5. The verifier re-reads the final commit's tree and compares it against the original head.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tree;
pub mod types;

pub use types::ObjectType;

use std::{
    fmt::Display,
    io::{BufRead, Read},
};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::{object::types::ObjectType, zlib::stream::inflate::ReadBoxed},
};

/// **The Object Trait**
/// Defines the common interface for all Git object types (blob, tree, commit).
pub trait ObjectTrait: Send + Sync + Display {
    /// Creates a new object from a byte slice.
    fn from_bytes(data: &[u8], hash: ObjectHash) -> Result<Self, GitError>
    where
        Self: Sized;

    /// Generate a new Object from a `ReadBoxed<BufRead>`.
    /// the input size,is only for new a vec with directive space allocation
    /// the input data stream and output object should be plain base object .
    fn from_buf_read<R: BufRead>(read: &mut ReadBoxed<R>, size: usize) -> Self
    where
        Self: Sized,
    {
        let mut content: Vec<u8> = Vec::with_capacity(size);
        read.read_to_end(&mut content).unwrap();
        let digest = read.hash.clone().finalize();
        let hash = ObjectHash::from_bytes(&digest).unwrap();
        Self::from_bytes(&content, hash).unwrap()
    }

    /// Returns the type of the object.
    fn get_type(&self) -> ObjectType;

    fn get_size(&self) -> usize;

    fn to_data(&self) -> Result<Vec<u8>, GitError>;

    /// Computes the object hash from serialized data.
    ///
    /// Default implementation serializes the object and computes the hash from that data.
    /// Override only if you need custom hash computation or caching.
    fn object_hash(&self) -> Result<ObjectHash, GitError> {
        let data = self.to_data()?;
        Ok(ObjectHash::from_type_and_data(self.get_type(), &data))
    }
}
