//! Postgres-backed [`MetadataStore`], grounded in the reference's `db`
//! package: the same four tables (`blobs`, `metadata`, `users`,
//! `sessions`), queried here with `sqlx` instead of `squirrel`.

use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::model::{Blob, Metadata, Session, User};

use super::MetadataStore;

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| Error::InvalidRequest(format!("database connection failed: {e}")))?;
        Ok(PgMetadataStore { pool })
    }

    /// Creates the schema if absent. The reference's `InitTables` used a
    /// single `text unique` column for blob names; here path uniqueness
    /// is scoped per-user instead, since two tenants may legitimately
    /// write to the same logical path (spec §9, resolved in DESIGN.md
    /// "Open Questions"). Deleted metadata rows are removed outright by
    /// `delete_meta` rather than tombstoned, so a plain unique index
    /// already covers "unique among non-deleted records".
    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                id text PRIMARY KEY,
                name text NOT NULL,
                bucket text NOT NULL,
                start bigint NOT NULL,
                size bigint NOT NULL,
                checksum text NOT NULL,
                deleted boolean NOT NULL DEFAULT false,
                created_at timestamptz NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS metadata (
                id text PRIMARY KEY,
                name text NOT NULL,
                parent text NOT NULL,
                mime text NOT NULL,
                path text NOT NULL,
                user_id text NOT NULL,
                blob text NOT NULL REFERENCES blobs(id),
                created_at timestamptz NOT NULL DEFAULT now()
            );

            CREATE UNIQUE INDEX IF NOT EXISTS metadata_user_path_live
                ON metadata (user_id, path);

            CREATE TABLE IF NOT EXISTS users (
                id text PRIMARY KEY,
                email text UNIQUE NOT NULL,
                password_hash text NOT NULL,
                created_at timestamptz NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id text PRIMARY KEY,
                user_id text NOT NULL REFERENCES users(id),
                created_at timestamptz NOT NULL DEFAULT now()
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::InvalidRequest(format!("schema init failed: {e}")))?;

        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::RowNotFound => Error::NotFound("row not found".to_string()),
        other => Error::InvalidRequest(format!("database error: {other}")),
    }
}

#[async_trait::async_trait]
impl MetadataStore for PgMetadataStore {
    async fn put_blob(&self, blob: &Blob) -> Result<()> {
        sqlx::query(
            "INSERT INTO blobs (id, name, bucket, start, size, checksum, deleted, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&blob.id)
        .bind(&blob.name)
        .bind(&blob.bucket)
        .bind(blob.start as i64)
        .bind(blob.size as i64)
        .bind(&blob.checksum)
        .bind(blob.deleted)
        .bind(blob.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_blob_by_id(&self, id: &str) -> Result<Blob> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT id, name, bucket, start, size, checksum, deleted, created_at
             FROM blobs WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn list_blobs_in_bucket(&self, bucket: &str) -> Result<Vec<Blob>> {
        let rows = sqlx::query_as::<_, BlobRow>(
            "SELECT id, name, bucket, start, size, checksum, deleted, created_at
             FROM blobs WHERE bucket = $1",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_blob_deleted(&self, id: &str, deleted: bool) -> Result<()> {
        sqlx::query("UPDATE blobs SET deleted = $1 WHERE id = $2")
            .bind(deleted)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_blob_start(&self, id: &str, start: u64) -> Result<()> {
        sqlx::query("UPDATE blobs SET start = $1 WHERE id = $2")
            .bind(start as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_blob(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM blobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn put_meta(&self, meta: &Metadata) -> Result<()> {
        sqlx::query(
            "INSERT INTO metadata (id, name, parent, mime, path, user_id, blob, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&meta.id)
        .bind(&meta.name)
        .bind(&meta.parent)
        .bind(&meta.mime)
        .bind(&meta.path)
        .bind(&meta.user_id)
        .bind(&meta.blob)
        .bind(meta.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_meta_by_id(&self, id: &str) -> Result<Metadata> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, name, parent, mime, path, user_id, blob, created_at
             FROM metadata WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn get_meta_by_path(&self, user_id: &str, path: &str) -> Result<Metadata> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, name, parent, mime, path, user_id, blob, created_at
             FROM metadata WHERE user_id = $1 AND path = $2",
        )
        .bind(user_id)
        .bind(path)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn list_meta_by_parent(&self, user_id: &str, parent: &str) -> Result<Vec<Metadata>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, name, parent, mime, path, user_id, blob, created_at
             FROM metadata WHERE user_id = $1 AND parent = $2",
        )
        .bind(user_id)
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_meta_by_user(&self, user_id: &str) -> Result<Vec<Metadata>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, name, parent, mime, path, user_id, blob, created_at
             FROM metadata WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_meta(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM metadata WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }

    async fn put_session(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(session.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Session> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, created_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into())
    }
}

#[derive(sqlx::FromRow)]
struct BlobRow {
    id: String,
    name: String,
    bucket: String,
    start: i64,
    size: i64,
    checksum: String,
    deleted: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<BlobRow> for Blob {
    fn from(row: BlobRow) -> Self {
        Blob {
            id: row.id,
            name: row.name,
            bucket: row.bucket,
            start: row.start as u64,
            size: row.size as u64,
            checksum: row.checksum,
            deleted: row.deleted,
            created_at: row.created_at,
            content: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MetadataRow {
    id: String,
    name: String,
    parent: String,
    mime: String,
    path: String,
    user_id: String,
    blob: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<MetadataRow> for Metadata {
    fn from(row: MetadataRow) -> Self {
        Metadata {
            id: row.id,
            name: row.name,
            path: row.path,
            parent: row.parent,
            mime: row.mime,
            user_id: row.user_id,
            blob: row.blob,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}
