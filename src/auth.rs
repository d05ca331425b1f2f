//! Password hashing and session authentication.
//!
//! The reference hashed passwords with bcrypt and looked sessions up by
//! treating the bearer token as an opaque session id (`checkAuth` in
//! `api/blob.go`): cache first, falling back to the index and
//! refreshing the cache on a miss. Password hashing here uses argon2
//! instead of bcrypt — the newer, still actively maintained choice in
//! this ecosystem — everything else follows the same shape.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::idgen;
use crate::model::{Session, User};
use crate::store::{Cache, MetadataStore};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::InvalidRequest(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::InvalidRequest(format!("stored password hash is invalid: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| Error::Unauthorized("invalid email or password".to_string()))
}

/// Mints a fresh session for `user_id`, persists it to the index, and
/// best-effort warms the cache.
pub async fn create_session(
    store: &dyn MetadataStore,
    cache: &dyn Cache,
    user_id: &str,
) -> Result<Session> {
    let session = Session {
        id: idgen::session_token(),
        user_id: user_id.to_string(),
        created_at: chrono::Utc::now(),
    };

    store.put_session(&session).await?;
    cache.put_session(&session).await;

    Ok(session)
}

/// Resolves a bearer token to its session, then to the owning user.
/// Cache first, index on a miss, with the cache refreshed afterward —
/// exactly the reference's `checkAuth` shape.
pub async fn authenticate(
    store: &dyn MetadataStore,
    cache: &dyn Cache,
    token: &str,
) -> Result<(Session, User)> {
    if token.is_empty() {
        return Err(Error::Unauthorized("missing session token".to_string()));
    }

    let session = match cache.get_session(token).await {
        Some(session) => session,
        None => {
            let session = store
                .get_session(token)
                .await
                .map_err(|_| Error::Unauthorized("invalid session token".to_string()))?;
            cache.put_session(&session).await;
            session
        }
    };

    let user = match cache.get_user(&session.user_id).await {
        Some(user) => user,
        None => {
            let user = store.get_user_by_id(&session.user_id).await?;
            cache.put_user(&user).await;
            user
        }
    };

    Ok((session, user))
}

/// Strips an optional `Bearer ` prefix, matching the reference's raw
/// `Authorization` header usage while tolerating the conventional
/// scheme prefix most HTTP clients add automatically.
pub fn bearer_token(header_value: &str) -> &str {
    header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert!(verify_password("wrong password", &hash).is_err());
    }

    #[test]
    fn bearer_prefix_is_stripped_when_present() {
        assert_eq!(bearer_token("Bearer abc123"), "abc123");
        assert_eq!(bearer_token("abc123"), "abc123");
    }
}
