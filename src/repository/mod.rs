//! Storage-level access to a Git object database: read existing objects, write new loose
//! objects, and move refs. This is deliberately narrower than the teacher's smart-protocol
//! `RepositoryAccess` trait — there is no pack negotiation, no push/pull wire format, and no
//! server-side authentication here, only the handful of operations the stacking pipeline
//! actually performs against a local or in-memory object store.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::errors::GitError;
use crate::hash::ObjectHash;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::Tree;

pub use local::LocalRepository;
pub use memory::MemoryRepository;

/// Storage-level operations the stacking pipeline needs against a Git object database.
///
/// Every method that touches disk or a remote suspends here — the pipeline's CPU-bound
/// phases (symbol-flow analysis, partitioning, feasibility resolution) never call through
/// this trait mid-computation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn has_object(&self, id: &ObjectHash) -> Result<bool, GitError>;

    async fn read_commit(&self, id: &ObjectHash) -> Result<Commit, GitError>;
    async fn read_tree(&self, id: &ObjectHash) -> Result<Tree, GitError>;
    async fn read_blob(&self, id: &ObjectHash) -> Result<Blob, GitError>;

    async fn write_blob(&self, blob: &Blob) -> Result<(), GitError>;
    async fn write_tree(&self, tree: &Tree) -> Result<(), GitError>;
    async fn write_commit(&self, commit: &Commit) -> Result<(), GitError>;

    /// Resolves a ref (e.g. `refs/heads/newpr/stack/pr-42/0001-auth`) to its current target,
    /// or `None` if it doesn't exist yet.
    async fn resolve_ref(&self, name: &str) -> Result<Option<ObjectHash>, GitError>;

    /// Creates or moves a ref. If `expected_old` is `Some`, the update is rejected with
    /// [`GitError::RefUpdateConflict`] unless the ref's current value matches exactly — this
    /// is what makes the safety-branch and per-group ref updates idempotent across re-runs.
    async fn update_ref(
        &self,
        name: &str,
        expected_old: Option<&ObjectHash>,
        new: &ObjectHash,
    ) -> Result<(), GitError>;
}

/// Injectable fetch hook for [`crate::stacking::context`]: given object IDs the context
/// capture phase couldn't find locally, attempt to materialize them (e.g. via `git fetch`)
/// before failing with `MissingObject`. The engine never negotiates the fetch itself; this
/// trait only marks the suspension point and lets the caller supply the transport.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, wanted: &[ObjectHash]) -> Result<(), GitError>;
}

/// A fetcher for repositories that are already fully materialized locally (tests, or a
/// caller that has already run `git fetch` up front). Always succeeds without doing anything.
pub struct NullFetcher;

#[async_trait]
impl RemoteFetcher for NullFetcher {
    async fn fetch(&self, _wanted: &[ObjectHash]) -> Result<(), GitError> {
        Ok(())
    }
}
