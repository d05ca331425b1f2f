//! The HTTP front door: axum router, shared application state, and the
//! status-code mapping from [`crate::error::Error`] that the reference
//! never had (it collapsed every failure to a 500).

pub mod blob;
pub mod user;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde_json::json;

use crate::error::Error;
use crate::handler::Handler;
use crate::pruner::Pruner;
use crate::store::{Cache, MetadataStore};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<Handler>,
    pub store: Arc<dyn MetadataStore>,
    pub cache: Arc<dyn Cache>,
    pub pruner: Arc<Pruner>,
    pub started_at: Arc<Instant>,
}

/// Maps every engine error onto an HTTP status, per spec §7/§9's
/// corrected table: the reference answered every failure with 500.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::ChecksumMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            Error::BucketOpenFailed { .. }
            | Error::ShortWrite { .. }
            | Error::ShortRead { .. }
            | Error::BucketCorrupt { .. }
            | Error::CompactionAborted { .. }
            | Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
        };

        (status, Json(json!({ "err": message }))).into_response()
    }
}

/// Ticks the pruner latch on every request, matching spec §4.5's
/// "on every request, increment a process-wide counter" — not just the
/// one route that happens to create tombstones. Applied as a route
/// layer in [`router`] so it runs ahead of every handler below it.
async fn pruner_tick(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    if state.pruner.tick() {
        tracing::info!("pruner latch fired, scheduling a compaction sweep");
        let spawn_state = state.clone();
        tokio::spawn(async move {
            run_compaction_sweep(spawn_state).await;
        });
    }

    next.run(request).await
}

/// Compacts every bucket the handler currently knows about.
///
/// A request that trips the latch has no single bucket of its own to
/// compact (unlike a delete, which at least names the blob it just
/// tombstoned), so the pruner sweeps the whole bucket set instead. The
/// latch is single-flight, so buckets are swept one at a time rather
/// than concurrently; releases the latch once the sweep is done,
/// success or failure on any individual bucket (spec §4.5, §9).
async fn run_compaction_sweep(state: AppState) {
    for bucket_id in state.handler.bucket_ids() {
        compact_bucket(&state, &bucket_id).await;
    }
    state.pruner.release();
}

/// Runs the compaction pass for one bucket, reconciling the metadata
/// index per spec §4.4 step 6. The blocking bucket rewrite itself runs
/// on the blocking pool since `Handler::compact` does synchronous file
/// I/O.
async fn compact_bucket(state: &AppState, bucket_id: &str) {
    let blobs = match state.store.list_blobs_in_bucket(bucket_id).await {
        Ok(blobs) => blobs,
        Err(err) => {
            tracing::error!(bucket = %bucket_id, error = %err, "compaction: failed to list blobs, aborting");
            return;
        }
    };

    if blobs.is_empty() {
        return;
    }

    // Cache invalidation must happen before the rewrite (spec §4.4
    // "Cache invalidation"): once the bucket is rewritten, stale cached
    // descriptors would point at the wrong offsets.
    let keys = Handler::cache_keys_for_bucket(&blobs);
    state.cache.delete_blobs(&keys).await;

    let handler = Arc::clone(&state.handler);
    let owned_bucket_id = bucket_id.to_string();
    let result = tokio::task::spawn_blocking(move || handler.compact(&owned_bucket_id, blobs)).await;

    match result {
        Ok(Ok(descriptors)) => {
            for desc in descriptors {
                let outcome = if desc.deleted {
                    state.store.delete_blob(&desc.id).await
                } else {
                    state.store.update_blob_start(&desc.id, desc.start).await
                };
                if let Err(err) = outcome {
                    tracing::error!(blob = %desc.id, error = %err, "compaction: failed to reconcile index row");
                }
            }
            tracing::info!(bucket = %bucket_id, "compaction complete");
        }
        Ok(Err(err)) => {
            tracing::error!(bucket = %bucket_id, error = %err, "compaction aborted, bucket may be in an intermediate state");
        }
        Err(join_err) => {
            tracing::error!(bucket = %bucket_id, error = %join_err, "compaction task panicked");
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/add", post(blob::add))
        .route("/info/:id", get(blob::info))
        .route("/file/:id", get(blob::download))
        .route("/delete/:id", delete(blob::delete))
        .route("/user/create", post(user::create))
        .route("/user/login", post(user::login))
        .route("/user/ls", get(user::ls))
        .route("/user/path_ls", get(user::path_ls))
        .route("/user/delete_dir/:dir", delete(user::delete_dir))
        .route_layer(middleware::from_fn_with_state(state.clone(), pruner_tick))
        .with_state(state)
}

async fn status(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "bucket_count": state.handler.bucket_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
