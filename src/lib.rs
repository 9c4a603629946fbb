//! Folio Server
//!
//! Serves document pages to a viewer from a bounded, LRU-evicted page cache.
//! Pages come from pre-rendered images listed in a manifest when available,
//! otherwise from a document renderer. Upcoming documents can be prefetched
//! in the background with at most one load per document in flight.
//!
//! # Modules
//!
//! - `pages`: page cache, manifest store, prefetch coordinator and loader
//! - `render`: renderer and image loader implementations
//! - `storage`: S3-compatible object access
//! - `routes`: HTTP API

pub mod config;
pub mod error;
pub mod pages;
pub mod render;
pub mod routes;
pub mod state;
pub mod storage;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/health", get(routes::health::health_check))
        .nest("/api/v1", routes::pages::router())
        .nest("/files", routes::files::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
