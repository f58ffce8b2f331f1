//! Fatal failure kinds for the stacking pipeline. Recoverable conditions go into
//! [`crate::stacking::warnings::Warning`] instead — nothing here is ever silently retried.

use thiserror::Error;

use crate::errors::GitError;
use crate::hash::ObjectHash;

#[derive(Error, Debug)]
pub enum StackingError {
    /// C1: neither the base nor the head SHA could be resolved locally, and the injected
    /// fetcher failed to materialize it.
    #[error("object {sha} is not present locally and could not be fetched")]
    MissingObject { sha: ObjectHash },

    /// C2: a commit on the first-parent path could not be read or decoded.
    #[error("commit {sha} on the base..head path could not be parsed: {cause}")]
    UnparseableCommit { sha: ObjectHash, cause: String },

    /// C4/C6: every touched path was dropped during partitioning, leaving nothing to plan.
    #[error("partitioning produced an empty ownership map over {touched_paths} touched paths")]
    EmptyOwnership { touched_paths: usize },

    /// C8: a group's materialized tree didn't match the tree predicted by the plan builder.
    #[error("group {group} tree mismatch: expected {expected}, built {actual}: {diff_summary}")]
    TreeMismatch {
        group: String,
        expected: ObjectHash,
        actual: ObjectHash,
        diff_summary: String,
    },

    /// C9: the executed stack's final tree doesn't reproduce the original head tree.
    #[error("verification failed: expected {expected}, got {actual} ({} differing paths)", differing_paths.len())]
    VerifyMismatch {
        expected: ObjectHash,
        actual: ObjectHash,
        differing_paths: Vec<String>,
    },

    /// C8: a ref update (safety branch or per-group branch) was rejected or failed.
    #[error("failed to write ref {r#ref}: {cause}")]
    RefWriteFailure { r#ref: String, cause: String },

    /// Lower-level object-store/object-model failure surfaced unchanged.
    #[error(transparent)]
    Object(#[from] GitError),
}
