//! Loose-object, filesystem-backed [`ObjectStore`]: objects live under `objects/<aa>/<...>`
//! zlib-compressed exactly like a real `.git` directory, refs live as plain files under `refs/`.
//! No packing, no alternates, no reflogs — only what the stacking pipeline needs to read an
//! existing repository's objects and add new ones alongside them.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use tokio::fs;

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::Tree;
use crate::internal::object::types::ObjectType;
use crate::internal::zlib::stream::deflate::compress_object;

use super::ObjectStore;

pub struct LocalRepository {
    /// The repository's `.git` directory (or a bare repo's root).
    git_dir: PathBuf,
}

impl LocalRepository {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        LocalRepository {
            git_dir: git_dir.into(),
        }
    }

    fn object_path(&self, id: &ObjectHash) -> PathBuf {
        let hex = id.to_string();
        self.git_dir
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..])
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf, GitError> {
        if name.contains("..") {
            return Err(GitError::InvalidArgument(format!(
                "refused to touch suspicious ref path: {name}"
            )));
        }
        Ok(self.git_dir.join(name))
    }

    async fn read_object_framed(&self, id: &ObjectHash) -> Result<(ObjectType, Vec<u8>), GitError> {
        let path = self.object_path(id);
        let compressed = fs::read(&path)
            .await
            .map_err(|_| GitError::ObjectNotFound(id.to_string()))?;

        let mut decoder = ZlibDecoder::new(compressed.as_slice());
        let mut framed = Vec::new();
        decoder.read_to_end(&mut framed)?;

        let space = framed
            .iter()
            .position(|&b| b == b' ')
            .ok_or(GitError::InvalidObjectInfo(id.to_string()))?;
        let nul = framed
            .iter()
            .position(|&b| b == 0)
            .ok_or(GitError::InvalidObjectInfo(id.to_string()))?;
        let obj_type = ObjectType::from_string(
            std::str::from_utf8(&framed[..space])
                .map_err(|e| GitError::ConversionError(e.to_string()))?,
        )?;
        Ok((obj_type, framed[nul + 1..].to_vec()))
    }

    async fn write_object(
        &self,
        id: &ObjectHash,
        obj_type: ObjectType,
        content: &[u8],
    ) -> Result<(), GitError> {
        let path = self.object_path(id);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let compressed = compress_object(obj_type, content)?;
        fs::write(&path, compressed).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalRepository {
    async fn has_object(&self, id: &ObjectHash) -> Result<bool, GitError> {
        Ok(fs::try_exists(self.object_path(id)).await.unwrap_or(false))
    }

    async fn read_commit(&self, id: &ObjectHash) -> Result<Commit, GitError> {
        let (obj_type, content) = self.read_object_framed(id).await?;
        if obj_type != ObjectType::Commit {
            return Err(GitError::InvalidCommitObject);
        }
        Commit::from_bytes(&content, *id)
    }

    async fn read_tree(&self, id: &ObjectHash) -> Result<Tree, GitError> {
        let (obj_type, content) = self.read_object_framed(id).await?;
        if obj_type != ObjectType::Tree {
            return Err(GitError::InvalidTreeObject);
        }
        Tree::from_bytes(&content, *id)
    }

    async fn read_blob(&self, id: &ObjectHash) -> Result<Blob, GitError> {
        let (obj_type, content) = self.read_object_framed(id).await?;
        if obj_type != ObjectType::Blob {
            return Err(GitError::InvalidBlobObject(id.to_string()));
        }
        Blob::from_bytes(&content, *id)
    }

    async fn write_blob(&self, blob: &Blob) -> Result<(), GitError> {
        self.write_object(&blob.id, ObjectType::Blob, &blob.to_data()?)
            .await
    }

    async fn write_tree(&self, tree: &Tree) -> Result<(), GitError> {
        self.write_object(&tree.id, ObjectType::Tree, &tree.to_data()?)
            .await
    }

    async fn write_commit(&self, commit: &Commit) -> Result<(), GitError> {
        self.write_object(&commit.id, ObjectType::Commit, &commit.to_data()?)
            .await
    }

    async fn resolve_ref(&self, name: &str) -> Result<Option<ObjectHash>, GitError> {
        let path = self.ref_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let hex = contents.trim();
                Ok(Some(ObjectHash::from_str_checked(hex)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GitError::IOError(e)),
        }
    }

    async fn update_ref(
        &self,
        name: &str,
        expected_old: Option<&ObjectHash>,
        new: &ObjectHash,
    ) -> Result<(), GitError> {
        let current = self.resolve_ref(name).await?;
        if let Some(expected) = expected_old {
            if current.as_ref() != Some(expected) {
                return Err(GitError::RefUpdateConflict(
                    name.to_string(),
                    Some(expected.to_string()),
                    current.map(|h| h.to_string()),
                ));
            }
        }
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, format!("{new}\n")).await?;
        Ok(())
    }
}

/// Small helper trait so the ref-reading code above can reuse `FromStr`'s error type without
/// importing `std::str::FromStr` into scope twice under different error conventions.
trait FromStrChecked: Sized {
    fn from_str_checked(s: &str) -> Result<Self, GitError>;
}

impl FromStrChecked for ObjectHash {
    fn from_str_checked(s: &str) -> Result<Self, GitError> {
        use std::str::FromStr;
        ObjectHash::from_str(s).map_err(GitError::InvalidHashValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HashKind, set_hash_kind_for_test};

    fn tmp_repo() -> (tempfile::TempDir, LocalRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepository::new(dir.path().join(".git"));
        (dir, repo)
    }

    #[tokio::test]
    async fn writes_and_reads_blob_round_trip() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let (_dir, repo) = tmp_repo();
        let blob = Blob::from_content(b"hello world\n".to_vec());

        repo.write_blob(&blob).await.unwrap();
        assert!(repo.has_object(&blob.id).await.unwrap());

        let read_back = repo.read_blob(&blob.id).await.unwrap();
        assert_eq!(read_back.data, blob.data);
    }

    #[tokio::test]
    async fn ref_update_rejects_stale_expected_old() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let (_dir, repo) = tmp_repo();
        let a = ObjectHash::new(b"a");
        let b = ObjectHash::new(b"b");

        repo.update_ref("refs/heads/x", None, &a).await.unwrap();
        assert_eq!(repo.resolve_ref("refs/heads/x").await.unwrap(), Some(a));

        let err = repo
            .update_ref("refs/heads/x", Some(&b), &b)
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::RefUpdateConflict(..)));

        repo.update_ref("refs/heads/x", Some(&a), &b).await.unwrap();
        assert_eq!(repo.resolve_ref("refs/heads/x").await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn missing_object_reports_not_found() {
        let _guard = set_hash_kind_for_test(HashKind::Sha256);
        let (_dir, repo) = tmp_repo();
        let missing = ObjectHash::new(b"does-not-exist");
        let err = repo.read_blob(&missing).await.unwrap_err();
        assert!(matches!(err, GitError::ObjectNotFound(_)));
    }
}
