//! Renderer and image-loading adapters
//!
//! Concrete implementations of the page pipeline's capability traits.

mod http;
#[cfg(feature = "render-mupdf")]
mod mupdf;

use async_trait::async_trait;

use crate::pages::{DocumentRenderer, OpenDocument, PageError, Result};

pub use http::HttpImageLoader;
#[cfg(feature = "render-mupdf")]
pub use self::mupdf::MupdfRenderer;

/// Renderer used when no rendering backend is compiled in
///
/// Documents without a manifest entry fail to load.
pub struct UnavailableRenderer;

#[async_trait]
impl DocumentRenderer for UnavailableRenderer {
    async fn open(&self, key: &str) -> Result<Box<dyn OpenDocument>> {
        Err(PageError::RendererUnavailable(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_renderer_fails() {
        let result = UnavailableRenderer.open("a.pdf").await;
        assert!(matches!(result, Err(PageError::RendererUnavailable(key)) if key == "a.pdf"));
    }
}
