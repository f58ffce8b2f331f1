//! In-memory [`ObjectStore`], useful for tests and for callers who've already loaded a
//! repository's relevant objects into memory (e.g. a forge-side service that has the objects
//! cached from a prior fetch).

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::Tree;
use crate::internal::object::types::ObjectType;

use super::ObjectStore;

#[derive(Default)]
pub struct MemoryRepository {
    objects: DashMap<ObjectHash, (ObjectType, Vec<u8>)>,
    refs: DashMap<String, ObjectHash>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        MemoryRepository {
            objects: DashMap::new(),
            refs: DashMap::new(),
        }
    }

    /// Seeds the store with an already-known object, bypassing `write_*`'s idempotent-insert
    /// path. Used by tests to build a fixture repository's starting state.
    pub fn seed_blob(&self, blob: &Blob) {
        self.objects
            .insert(blob.id, (ObjectType::Blob, blob.data.clone()));
    }

    pub fn seed_tree(&self, tree: &Tree) -> Result<(), GitError> {
        self.objects
            .insert(tree.id, (ObjectType::Tree, tree.to_data()?));
        Ok(())
    }

    pub fn seed_commit(&self, commit: &Commit) -> Result<(), GitError> {
        self.objects
            .insert(commit.id, (ObjectType::Commit, commit.to_data()?));
        Ok(())
    }

    pub fn seed_ref(&self, name: impl Into<String>, id: ObjectHash) {
        self.refs.insert(name.into(), id);
    }
}

#[async_trait]
impl ObjectStore for MemoryRepository {
    async fn has_object(&self, id: &ObjectHash) -> Result<bool, GitError> {
        Ok(self.objects.contains_key(id))
    }

    async fn read_commit(&self, id: &ObjectHash) -> Result<Commit, GitError> {
        let (obj_type, data) = self
            .objects
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| GitError::ObjectNotFound(id.to_string()))?;
        if obj_type != ObjectType::Commit {
            return Err(GitError::InvalidCommitObject);
        }
        Commit::from_bytes(&data, *id)
    }

    async fn read_tree(&self, id: &ObjectHash) -> Result<Tree, GitError> {
        let (obj_type, data) = self
            .objects
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| GitError::ObjectNotFound(id.to_string()))?;
        if obj_type != ObjectType::Tree {
            return Err(GitError::InvalidTreeObject);
        }
        Tree::from_bytes(&data, *id)
    }

    async fn read_blob(&self, id: &ObjectHash) -> Result<Blob, GitError> {
        let (obj_type, data) = self
            .objects
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| GitError::ObjectNotFound(id.to_string()))?;
        if obj_type != ObjectType::Blob {
            return Err(GitError::InvalidBlobObject(id.to_string()));
        }
        Blob::from_bytes(&data, *id)
    }

    async fn write_blob(&self, blob: &Blob) -> Result<(), GitError> {
        self.objects
            .entry(blob.id)
            .or_insert_with(|| (ObjectType::Blob, blob.data.clone()));
        Ok(())
    }

    async fn write_tree(&self, tree: &Tree) -> Result<(), GitError> {
        let data = tree.to_data()?;
        self.objects
            .entry(tree.id)
            .or_insert_with(|| (ObjectType::Tree, data));
        Ok(())
    }

    async fn write_commit(&self, commit: &Commit) -> Result<(), GitError> {
        let data = commit.to_data()?;
        self.objects
            .entry(commit.id)
            .or_insert_with(|| (ObjectType::Commit, data));
        Ok(())
    }

    async fn resolve_ref(&self, name: &str) -> Result<Option<ObjectHash>, GitError> {
        Ok(self.refs.get(name).map(|e| *e.value()))
    }

    async fn update_ref(
        &self,
        name: &str,
        expected_old: Option<&ObjectHash>,
        new: &ObjectHash,
    ) -> Result<(), GitError> {
        let current = self.refs.get(name).map(|e| *e.value());
        if let Some(expected) = expected_old {
            if current.as_ref() != Some(expected) {
                return Err(GitError::RefUpdateConflict(
                    name.to_string(),
                    Some(expected.to_string()),
                    current.map(|h| h.to_string()),
                ));
            }
        }
        self.refs.insert(name.to_string(), *new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};

    #[tokio::test]
    async fn seeded_blob_is_readable() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let blob = Blob::from_content(b"hi".to_vec());
        repo.seed_blob(&blob);
        let read_back = repo.read_blob(&blob.id).await.unwrap();
        assert_eq!(read_back, blob);
    }

    #[tokio::test]
    async fn write_is_idempotent() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let repo = MemoryRepository::new();
        let blob = Blob::from_content(b"hi".to_vec());
        repo.write_blob(&blob).await.unwrap();
        repo.write_blob(&blob).await.unwrap();
        assert_eq!(repo.objects.len(), 1);
    }
}
