//! File serving routes
//!
//! Proxies documents and page thumbnails from object storage.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route("/*path", get(serve_file))
}

/// Serve an object from the bucket
async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response> {
    let store = state.storage().ok_or(AppError::StorageUnavailable)?;
    let object = store.get_object(&path).await?;
    let metadata = object.metadata;

    let content_type = metadata.content_type.unwrap_or_else(|| {
        mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string()
    });

    let filename = path.rsplit('/').next().unwrap_or(&path);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, object.data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "public, max-age=86400");

    if let Some(modified) = metadata.last_modified {
        response = response.header(
            header::LAST_MODIFIED,
            modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
    }
    if let Some(etag) = metadata.etag {
        response = response.header(header::ETAG, etag);
    }

    response
        .body(Body::from(object.data))
        .map_err(|e| AppError::Internal(e.to_string()))
}
