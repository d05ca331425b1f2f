//! Error kinds the storage engine surfaces to its caller.
//!
//! The engine never logs-and-swallows: every failure mode is a distinct
//! variant so the HTTP layer can map it to the right status code instead of
//! collapsing everything to a 500.

use thiserror::Error;

/// Errors raised by the bucket/placement/handler core.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to open or stat a bucket file during startup.
    #[error("bucket {path} could not be opened: {source}")]
    BucketOpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An append wrote fewer bytes than requested; the bucket's `pos` is left untouched.
    #[error("short write to bucket {bucket}: wrote {wrote} of {requested} bytes")]
    ShortWrite {
        bucket: String,
        wrote: usize,
        requested: usize,
    },

    /// A positional read returned fewer bytes than the descriptor promised.
    #[error("short read from bucket {bucket} at offset {start}: got {got} of {expected} bytes")]
    ShortRead {
        bucket: String,
        start: u64,
        expected: u64,
        got: u64,
    },

    /// Recomputed checksum does not match the stored one. Fatal for that blob.
    #[error("checksum mismatch for blob {id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// `pos != size` was observed when a bucket was opened.
    #[error("bucket {path} is corrupt: pos {pos} != size {size}")]
    BucketCorrupt { path: String, pos: u64, size: u64 },

    /// Compaction failed partway through; the bucket may be in an intermediate state.
    #[error("compaction of bucket {bucket} aborted: {reason}")]
    CompactionAborted { bucket: String, reason: String },

    /// Unknown blob or metadata id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not authorized to act on the referenced resource.
    #[error("unauthorized access to {0}")]
    Unauthorized(String),

    /// Caller supplied a malformed request (bad path, missing field, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Wraps any other I/O failure (truncate, seek, directory scan, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
