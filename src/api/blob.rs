//! `/add`, `/info/:id`, `/file/:id`, `/delete/:id` — grounded in the
//! reference's `api/blob.go`.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use std::collections::HashMap;

use crate::auth;
use crate::checksum::hex_sha256;
use crate::error::Error;
use crate::model::Metadata;

use super::{AppState, ApiError};

async fn authenticate_header(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<crate::model::Session, ApiError> {
    let raw = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth::bearer_token(raw);
    let (session, _user) = auth::authenticate(state.store.as_ref(), state.cache.as_ref(), token).await?;
    Ok(session)
}

/// `/file/:id` additionally accepts the session as a `?session=` query
/// parameter, since a plain `<img src="/file/:id">` cannot set headers.
async fn authenticate_header_or_query(
    state: &AppState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<crate::model::Session, ApiError> {
    let header_token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(auth::bearer_token);

    let token = header_token
        .filter(|t| !t.is_empty())
        .or_else(|| query.get("session").map(|s| s.as_str()))
        .unwrap_or("");

    let (session, _user) = auth::authenticate(state.store.as_ref(), state.cache.as_ref(), token).await?;
    Ok(session)
}

pub async fn add(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut form: Multipart,
) -> Result<Json<Metadata>, ApiError> {
    let session = authenticate_header(&state, &headers).await?;

    let mut path: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "path" => {
                path = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| Error::InvalidRequest(format!("path field unreadable: {e}")))?,
                )
            }
            "content" => {
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| Error::InvalidRequest(format!("content field unreadable: {e}")))?
                        .to_vec(),
                )
            }
            _ => {}
        }
    }

    let path = path.ok_or_else(|| Error::InvalidRequest("path is needed in the form".to_string()))?;
    let content = content.ok_or_else(|| Error::InvalidRequest("content is needed in the form".to_string()))?;

    let (blob, meta) = state.handler.insert(&path, &content, &session.user_id)?;

    // Enforce the per-user path uniqueness spec.md §3 requires before the
    // metadata row lands, since the partial index only fires inside Postgres.
    if state
        .store
        .get_meta_by_path(&session.user_id, &meta.path)
        .await
        .is_ok()
    {
        return Err(ApiError(Error::InvalidRequest(format!(
            "path {} already exists for this user",
            meta.path
        ))));
    }

    state.store.put_blob(&blob).await?;
    state.store.put_meta(&meta).await?;
    state.cache.put_blob(&blob).await;
    state.cache.put_meta(&meta).await;

    Ok(Json(meta))
}

pub async fn info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Metadata>, ApiError> {
    let session = authenticate_header(&state, &headers).await?;

    let meta = match state.cache.get_meta(&id).await {
        Some(meta) => meta,
        None => {
            let meta = state.store.get_meta_by_id(&id).await?;
            state.cache.put_meta(&meta).await;
            meta
        }
    };

    if meta.user_id != session.user_id {
        return Err(ApiError(Error::Unauthorized(format!(
            "metadata {id} does not belong to this session"
        ))));
    }

    Ok(Json(meta))
}

pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authenticate_header_or_query(&state, &headers, &query).await?;

    let meta = match state.cache.get_meta(&id).await {
        Some(meta) => meta,
        None => {
            let meta = state.store.get_meta_by_id(&id).await?;
            state.cache.put_meta(&meta).await;
            meta
        }
    };

    if meta.user_id != session.user_id {
        return Err(ApiError(Error::Unauthorized(format!(
            "metadata {id} does not belong to this session"
        ))));
    }

    let blob = match state.cache.get_blob(&meta.blob).await {
        Some(blob) => blob,
        None => {
            let blob = state.store.get_blob_by_id(&meta.blob).await?;
            state.cache.put_blob(&blob).await;
            blob
        }
    };

    let filled = state.handler.fetch(&blob)?;
    let bytes = filled.content.expect("fetch always fills content");

    if hex_sha256(&bytes) != blob.checksum {
        tracing::error!(blob = %blob.id, "checksum mismatch on read");
        return Err(ApiError(Error::ChecksumMismatch {
            id: blob.id,
            expected: blob.checksum,
            actual: hex_sha256(&bytes),
        }));
    }

    Ok(([("content-type", meta.mime)], bytes))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = authenticate_header(&state, &headers).await?;

    state
        .handler
        .delete(state.store.as_ref(), state.cache.as_ref(), &id, &session.user_id)
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
