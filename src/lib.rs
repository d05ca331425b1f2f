//! A multi-tenant object store: append-only bucket files addressed by a
//! Postgres metadata index, fronted by a Redis look-aside cache and a
//! thin axum HTTP surface.
//!
//! The storage core — [`bucket`], [`placement`], [`handler`], [`pruner`]
//! — never touches the index or the cache directly. Those live behind
//! the [`store`] traits, implemented concretely in [`store::postgres`]
//! and [`store::redis_cache`], and are wired together by whatever binary
//! embeds this crate (see `src/bin/server.rs`).

pub mod api;
pub mod auth;
pub mod bucket;
pub mod checksum;
pub mod config;
pub mod error;
pub mod handler;
pub mod idgen;
pub mod model;
pub mod pathutil;
pub mod placement;
pub mod pruner;
pub mod store;

pub use error::{Error, Result};
