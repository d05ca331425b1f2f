//! Process entrypoint: loads configuration, wires the storage engine to
//! its metadata index and cache, and serves the HTTP surface.
//!
//! Grounded in the reference's `cmd/main.go` + `api.NewServer`/`Start`,
//! generalized from a synchronous `slog` + gin setup to `tracing` +
//! tokio + axum.

use std::sync::Arc;
use std::time::Instant;

use siloed::api::{router, AppState};
use siloed::config::Config;
use siloed::handler::Handler;
use siloed::pruner::Pruner;
use siloed::store::postgres::PgMetadataStore;
use siloed::store::redis_cache::RedisCache;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let store = match PgMetadataStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to the metadata index");
            std::process::exit(1);
        }
    };

    if let Err(err) = store.init_tables().await {
        tracing::error!(error = %err, "failed to initialize the metadata schema");
        std::process::exit(1);
    }

    let cache = match RedisCache::connect(&config.redis_url) {
        Ok(cache) => cache,
        Err(err) => {
            tracing::error!(error = %err, "failed to construct the cache client");
            std::process::exit(1);
        }
    };

    let handler = match Handler::open(config.bucket_path.clone()) {
        Ok(handler) => handler,
        Err(err) => {
            tracing::error!(error = %err, "failed to open bucket storage");
            std::process::exit(1);
        }
    };

    let state = AppState {
        handler: Arc::new(handler),
        store: Arc::new(store),
        cache: Arc::new(cache),
        pruner: Arc::new(Pruner::new()),
        started_at: Arc::new(Instant::now()),
    };

    let app = router(state);

    let addr: std::net::SocketAddr = match config.listen_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.listen_addr, "invalid listen address");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "starting server");

    if let Err(err) = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
    {
        tracing::error!(error = %err, "server exited with an error");
    }
}
