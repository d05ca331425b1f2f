//! Redis-backed look-aside [`Cache`], grounded in the reference's
//! `cache` package: JSON-encoded values, 7-day TTL, one key per id.
//!
//! Every operation logs and swallows its error instead of propagating
//! it — a cold or unreachable cache must never fail a request that the
//! metadata index could have served on its own (spec §6).

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::model::{Blob, Metadata, Session, User};

use super::Cache as CacheTrait;

const TTL_SECONDS: u64 = 60 * 60 * 24 * 7;

pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(RedisCache { client })
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(key, error = %err, "cache connection failed");
                return None;
            }
        };

        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "cache get failed");
                return None;
            }
        };

        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key, error = %err, "cache value was not valid json");
                    None
                }
            },
            None => None,
        }
    }

    async fn put_json<T: Serialize + Sync>(&self, key: &str, value: &T) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(key, error = %err, "cache connection failed");
                return;
            }
        };

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "failed to encode cache value");
                return;
            }
        };

        if let Err(err) = conn
            .set_ex::<_, _, ()>(key, encoded, TTL_SECONDS)
            .await
        {
            warn!(key, error = %err, "cache set failed");
        }
    }
}

/// Blob, metadata, user, and session ids are all independently generated
/// 8-character tokens (spec §6) drawn from the same alphabet, so nothing
/// stops two different kinds of record from sharing an id. Namespacing
/// every key by record type keeps such a collision from clobbering or
/// misdecoding an unrelated entry.
fn key(prefix: &str, id: &str) -> String {
    format!("{prefix}:{id}")
}

#[async_trait::async_trait]
impl CacheTrait for RedisCache {
    async fn get_blob(&self, id: &str) -> Option<Blob> {
        self.get_json(&key("blob", id)).await
    }

    async fn put_blob(&self, blob: &Blob) {
        self.put_json(&key("blob", &blob.id), blob).await
    }

    async fn delete_blobs(&self, ids: &[String]) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "cache connection failed");
                return;
            }
        };
        for id in ids {
            let full_key = key("blob", id);
            if let Err(err) = conn.del::<_, ()>(&full_key).await {
                warn!(key = %full_key, error = %err, "cache delete failed");
            }
        }
    }

    async fn get_meta(&self, id: &str) -> Option<Metadata> {
        self.get_json(&key("meta", id)).await
    }

    async fn put_meta(&self, meta: &Metadata) {
        self.put_json(&key("meta", &meta.id), meta).await
    }

    async fn get_user(&self, id: &str) -> Option<User> {
        self.get_json(&key("user", id)).await
    }

    async fn put_user(&self, user: &User) {
        self.put_json(&key("user", &user.id), user).await
    }

    async fn get_session(&self, id: &str) -> Option<Session> {
        self.get_json(&key("session", id)).await
    }

    async fn put_session(&self, session: &Session) {
        self.put_json(&key("session", &session.id), session).await
    }
}
