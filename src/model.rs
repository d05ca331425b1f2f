//! Descriptors that flow between the storage engine and its callers.
//!
//! Field sets are taken from the reference's `types` package, generalized
//! to Rust's type system (`chrono::DateTime<Utc>` for timestamps, owned
//! `String`/`Vec<u8>` rather than Go's loosely-typed JSON tags).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored payload, addressed by `(bucket, start, size)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: String,
    pub name: String,
    pub bucket: String,
    pub start: u64,
    pub size: u64,
    pub checksum: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    /// Populated only by `Handler::fetch`; absent from index rows.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<Vec<u8>>,
}

/// User-visible, path-addressable descriptor of a [`Blob`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub name: String,
    pub path: String,
    pub parent: String,
    pub mime: String,
    pub user_id: String,
    pub blob: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
