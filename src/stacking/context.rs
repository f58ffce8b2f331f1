//! C1 — Context Capture: resolve base/head SHAs, ensure both are present locally, fetch on miss.

use std::path::PathBuf;

use crate::hash::ObjectHash;
use crate::repository::{ObjectStore, RemoteFetcher};
use crate::stacking::errors::StackingError;
use crate::stacking::model::Context;

/// Resolves `base_sha`/`head_sha` against `store`, issuing one fetch attempt through `fetcher`
/// for whichever (if either) is missing. Performs no writes. Retries are the caller's concern —
/// this function either succeeds once or fails with [`StackingError::MissingObject`].
pub async fn capture(
    store: &dyn ObjectStore,
    fetcher: &dyn RemoteFetcher,
    repo_path: PathBuf,
    base_sha: ObjectHash,
    head_sha: ObjectHash,
) -> Result<Context, StackingError> {
    let mut missing = Vec::new();
    for id in [base_sha, head_sha] {
        if !store.has_object(&id).await? {
            missing.push(id);
        }
    }

    if !missing.is_empty() {
        fetcher.fetch(&missing).await?;
        for id in &missing {
            if !store.has_object(id).await? {
                return Err(StackingError::MissingObject { sha: *id });
            }
        }
    }

    Ok(Context {
        repo_path,
        base_sha,
        head_sha,
    })
}
