//! Error types used across object parsing, the loose-object store, and the stacking pipeline.
//!
//! `GitError` covers the low-level object model (blobs/trees/commits, hashing, zlib framing).
//! Pipeline-level failures that aren't about object encoding live in [`crate::stacking::errors`].

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the object model and loose-object storage layer.
pub enum GitError {
    /// Invalid or unsupported git object type name.
    #[error("The `{0}` is not a valid git object type.")]
    InvalidObjectType(String),

    /// Malformed or unsupported blob object encoding.
    #[error("The `{0}` is not a valid git blob object.")]
    InvalidBlobObject(String),

    /// Malformed tree object.
    #[error("Not a valid git tree object.")]
    InvalidTreeObject,

    /// Invalid tree entry (mode/name/hash).
    #[error("The `{0}` is not a valid git tree item.")]
    InvalidTreeItem(String),

    /// Tree contains no entries.
    #[error("`{0}`.")]
    EmptyTreeItems(String),

    /// Invalid commit signature type.
    #[error("The `{0}` is not a valid git commit signature.")]
    InvalidSignatureType(String),

    /// Malformed commit object.
    #[error("Not a valid git commit object.")]
    InvalidCommitObject,

    /// Commit parse or validation failed.
    #[error("Invalid Commit: {0}")]
    InvalidCommit(String),

    /// Invalid CLI or function argument.
    #[error("Argument parse failed: {0}")]
    InvalidArgument(String),

    /// I/O error from underlying reader or writer.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// Invalid SHA1/SHA-256 hash formatting or value.
    #[error("The {0} is not a valid Hash value")]
    InvalidHashValue(String),

    /// Invalid decoded object info.
    #[error("Error decode in the Object, info:{0}")]
    InvalidObjectInfo(String),

    /// Text encoding or UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    ConversionError(String),

    /// Invalid path when locating parent tree.
    #[error("Can't find parent tree by path: {0}")]
    InvalidPathError(String),

    /// Object missing from the backing store.
    #[error("Can't find specific object: {0}")]
    ObjectNotFound(String),

    /// Ref update was rejected because the old value didn't match.
    #[error("Ref `{0}` update rejected: expected {1:?}, found {2:?}")]
    RefUpdateConflict(String, Option<String>, Option<String>),

    /// Generic custom error for miscellaneous failures.
    #[error("{0}")]
    CustomError(String),
}
