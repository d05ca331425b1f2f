//! External collaborators: the metadata index and the look-aside cache.
//!
//! Neither trait is touched by [`crate::handler::Handler`] — the core
//! storage engine only knows about buckets and bytes. Whoever wires
//! up a request (the `api` layer) owns an implementation of each and
//! is responsible for keeping the index, the cache, and the bucket
//! files consistent with each other.

pub mod postgres;
pub mod redis_cache;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Blob, Metadata, Session, User};

/// The durable record of every blob and its path-addressable metadata.
/// Grounded in the reference's `db` package (squirrel + `lib/pq`), here
/// built on `sqlx` against Postgres.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_blob(&self, blob: &Blob) -> Result<()>;
    async fn get_blob_by_id(&self, id: &str) -> Result<Blob>;
    async fn list_blobs_in_bucket(&self, bucket: &str) -> Result<Vec<Blob>>;
    async fn set_blob_deleted(&self, id: &str, deleted: bool) -> Result<()>;
    async fn update_blob_start(&self, id: &str, start: u64) -> Result<()>;
    async fn delete_blob(&self, id: &str) -> Result<()>;

    async fn put_meta(&self, meta: &Metadata) -> Result<()>;
    async fn get_meta_by_id(&self, id: &str) -> Result<Metadata>;
    async fn get_meta_by_path(&self, user_id: &str, path: &str) -> Result<Metadata>;
    async fn list_meta_by_parent(&self, user_id: &str, parent: &str) -> Result<Vec<Metadata>>;
    async fn list_meta_by_user(&self, user_id: &str) -> Result<Vec<Metadata>>;
    async fn delete_meta(&self, id: &str) -> Result<()>;

    async fn put_user(&self, user: &User) -> Result<()>;
    async fn get_user_by_email(&self, email: &str) -> Result<User>;
    async fn get_user_by_id(&self, id: &str) -> Result<User>;

    async fn put_session(&self, session: &Session) -> Result<()>;
    async fn get_session(&self, id: &str) -> Result<Session>;
}

/// A best-effort look-aside cache in front of [`MetadataStore`]. Every
/// method here is non-fatal on failure per spec §6: callers log and
/// fall through to the index rather than propagating a cache outage
/// as a request failure.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_blob(&self, id: &str) -> Option<Blob>;
    async fn put_blob(&self, blob: &Blob);
    async fn delete_blobs(&self, ids: &[String]);

    async fn get_meta(&self, id: &str) -> Option<Metadata>;
    async fn put_meta(&self, meta: &Metadata);

    async fn get_user(&self, id: &str) -> Option<User>;
    async fn put_user(&self, user: &User);

    async fn get_session(&self, id: &str) -> Option<Session>;
    async fn put_session(&self, session: &Session);
}
