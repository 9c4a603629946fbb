//! Page API endpoints
//!
//! - Get-or-load a document's pages as JSON or as a Server-Sent Events stream
//! - Queue look-ahead prefetches
//! - Inspect and clear the page cache
//! - Reload the manifest

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Duration;

use crate::error::{AppError, Result};
use crate::pages::{LoadEvent, PageImage, PageSource, ServiceStats};
use crate::state::AppState;

/// Upper bound on documents queued by one prefetch request
pub const MAX_PREFETCH_KEYS: usize = 100;

/// Upper bound on the delay between look-ahead prefetches
pub const MAX_STAGGER_MS: u64 = 60_000;

/// Create the pages router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pages/*key", get(get_pages))
        .route("/stream/*key", get(stream_pages))
        .route("/prefetch", post(prefetch))
        .route("/cache", get(cache_stats).delete(clear_cache))
        .route("/manifest/reload", post(reload_manifest))
}

/// Loaded pages for one document
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagesResponse {
    pub key: String,
    pub source: PageSource,
    pub page_count: usize,
    pub pages: Vec<PageImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchRequest {
    pub keys: Vec<String>,
    /// Delay between consecutive prefetches, in milliseconds
    #[serde(default)]
    pub stagger_ms: u64,
}

impl PrefetchRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.keys.is_empty() {
            return Err("keys must not be empty".to_string());
        }
        if self.keys.len() > MAX_PREFETCH_KEYS {
            return Err(format!(
                "at most {} keys per request, got {}",
                MAX_PREFETCH_KEYS,
                self.keys.len()
            ));
        }
        if self.stagger_ms > MAX_STAGGER_MS {
            return Err(format!("staggerMs must be at most {}", MAX_STAGGER_MS));
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct PrefetchResponse {
    pub accepted: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheResponse {
    #[serde(flatten)]
    pub stats: ServiceStats,
    /// Cached keys, least recently used first
    pub keys: Vec<String>,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub loaded: bool,
    pub documents: usize,
}

async fn get_pages(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PagesResponse>> {
    tracing::debug!(key = %key, "Loading pages");

    let loaded = state.pages().load(key.clone()).await.map_err(AppError::LoadFailed)?;

    Ok(Json(PagesResponse {
        key,
        source: loaded.source,
        page_count: loaded.pages.len(),
        pages: loaded.pages.as_slice().to_vec(),
    }))
}

/// Stream load progress
///
/// The client disconnecting drops the stream, which cancels the load.
async fn stream_pages(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let events = state
        .pages()
        .open(key)
        .into_stream()
        .map(|event| Ok(sse_event(&event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn sse_event(event: &LoadEvent) -> Event {
    let (name, data) = match event {
        LoadEvent::Started { total, source } => {
            ("started", json!({ "total": total, "source": source }))
        }
        LoadEvent::Page { number, image } => ("page", json!({ "number": number, "image": image })),
        LoadEvent::Ready { pages, source } => {
            ("ready", json!({ "pageCount": pages.len(), "source": source }))
        }
        LoadEvent::Failed { message } => ("failed", json!({ "message": message })),
    };

    Event::default().event(name).data(data.to_string())
}

async fn prefetch(
    State(state): State<AppState>,
    Json(request): Json<PrefetchRequest>,
) -> Result<(StatusCode, Json<PrefetchResponse>)> {
    request.validate().map_err(AppError::BadRequest)?;

    let accepted = request.keys.len();
    state
        .pages()
        .prefetch_ahead(request.keys, Duration::from_millis(request.stagger_ms));

    Ok((StatusCode::ACCEPTED, Json(PrefetchResponse { accepted })))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheResponse> {
    let pages = state.pages();
    Json(CacheResponse {
        stats: pages.stats(),
        keys: pages.cache().keys(),
    })
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.pages().cache().clear();
    tracing::info!("Page cache cleared");
    StatusCode::NO_CONTENT
}

async fn reload_manifest(State(state): State<AppState>) -> Json<ReloadResponse> {
    let loaded = state.pages().reload_manifest().await;
    Json(ReloadResponse {
        loaded,
        documents: state.pages().manifest().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_request_defaults() {
        let request: PrefetchRequest = serde_json::from_str(r#"{"keys": ["a.pdf"]}"#).unwrap();
        assert_eq!(request.keys, vec!["a.pdf"]);
        assert_eq!(request.stagger_ms, 0);
    }

    #[test]
    fn test_prefetch_request_limits() {
        let request = |keys: usize, stagger_ms: u64| PrefetchRequest {
            keys: (0..keys).map(|i| format!("{}.pdf", i)).collect(),
            stagger_ms,
        };

        assert!(request(1, 0).validate().is_ok());
        assert!(request(MAX_PREFETCH_KEYS, MAX_STAGGER_MS).validate().is_ok());
        assert!(request(0, 0).validate().is_err());
        assert!(request(MAX_PREFETCH_KEYS + 1, 0).validate().is_err());
        assert!(request(1, u64::MAX).validate().is_err());
    }
}
