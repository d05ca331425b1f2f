//! `/user/create`, `/user/login`, `/user/ls`, `/user/path_ls`,
//! `/user/delete_dir/:dir` — grounded in the reference's `api/user.go`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Form;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::error::Error;
use crate::idgen;
use crate::model::{Metadata, Session, User};
use crate::pathutil;

use super::{ApiError, AppState};

#[derive(Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<Credentials>,
) -> Result<Json<Session>, ApiError> {
    let password_hash = auth::hash_password(&form.password)?;

    let user = User {
        id: idgen::short_id(),
        email: form.email,
        password_hash,
        created_at: chrono::Utc::now(),
    };

    state.store.put_user(&user).await?;
    state.cache.put_user(&user).await;

    let session = auth::create_session(state.store.as_ref(), state.cache.as_ref(), &user.id).await?;

    Ok(Json(session))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<Credentials>,
) -> Result<Json<Session>, ApiError> {
    let user = state
        .store
        .get_user_by_email(&form.email)
        .await
        .map_err(|_| Error::Unauthorized("invalid email or password".to_string()))?;

    auth::verify_password(&form.password, &user.password_hash)?;

    let session = auth::create_session(state.store.as_ref(), state.cache.as_ref(), &user.id).await?;

    Ok(Json(session))
}

async fn authenticated_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let raw = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth::bearer_token(raw);
    let (_session, user) = auth::authenticate(state.store.as_ref(), state.cache.as_ref(), token).await?;
    Ok(user)
}

async fn list_for_user(
    state: &AppState,
    user_id: &str,
    dir: Option<&str>,
) -> Result<Vec<Metadata>, Error> {
    match dir {
        Some(dir) => state.handler.list_by_parent(state.store.as_ref(), user_id, dir).await,
        None => state.handler.list_by_user(state.store.as_ref(), user_id).await,
    }
}

pub async fn ls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Metadata>>, ApiError> {
    let user = authenticated_user(&state, &headers).await?;
    let metas = list_for_user(&state, &user.id, query.get("dir").map(|s| s.as_str())).await?;
    Ok(Json(metas))
}

/// Builds the nested directory tree the reference's `buildDir` produced:
/// each path segment becomes a key, with `null` marking a leaf (a file).
fn build_dir(files: &[Metadata]) -> Value {
    let mut root = serde_json::Map::new();

    for file in files {
        let mut current = &mut root;
        let components: Vec<&str> = file.path.split('/').filter(|s| !s.is_empty()).collect();

        for (i, component) in components.iter().enumerate() {
            if i == components.len() - 1 {
                current.insert((*component).to_string(), Value::Null);
            } else {
                let entry = current
                    .entry((*component).to_string())
                    .or_insert_with(|| Value::Object(serde_json::Map::new()));
                current = entry.as_object_mut().expect("directory entries are always objects");
            }
        }
    }

    Value::Object(root)
}

pub async fn path_ls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticated_user(&state, &headers).await?;
    let metas = list_for_user(&state, &user.id, query.get("dir").map(|s| s.as_str())).await?;
    Ok(Json(build_dir(&metas)))
}

/// Tombstones every blob and removes every metadata row rooted at
/// `dir` for the authenticated user. Not present in the captured
/// reference; added to satisfy spec.md §6's route list, symmetric with
/// `list_by_parent`.
pub async fn delete_dir(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(dir): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticated_user(&state, &headers).await?;
    let cleaned = pathutil::clean(&dir);
    let prefix = format!("{cleaned}/");

    let to_remove: Vec<Metadata> = state
        .store
        .list_meta_by_user(&user.id)
        .await?
        .into_iter()
        .filter(|meta| meta.parent == cleaned || meta.parent.starts_with(&prefix))
        .collect();

    let mut blob_ids = Vec::with_capacity(to_remove.len());
    for meta in &to_remove {
        state.store.set_blob_deleted(&meta.blob, true).await?;
        state.store.delete_meta(&meta.id).await?;
        blob_ids.push(meta.blob.clone());
    }
    state.cache.delete_blobs(&blob_ids).await;

    Ok(Json(json!({ "deleted": to_remove.len() })))
}
