//! Capability traits
//!
//! Interfaces to the collaborators the page pipeline depends on but does not
//! implement itself: the manifest feed, the PDF renderer and image loading.

use async_trait::async_trait;

use super::error::Result;
use super::manifest::Manifest;
use super::types::PageImage;

/// Source of the precomputed page-count manifest
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the complete manifest
    async fn fetch(&self) -> Result<Manifest>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// External rendering capability for documents without precomputed pages
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Open a document by key, ready to render pages
    async fn open(&self, key: &str) -> Result<Box<dyn OpenDocument>>;
}

/// A document opened by a [`DocumentRenderer`]
#[async_trait]
pub trait OpenDocument: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// Render a single 1-based page
    async fn render_page(&self, page: usize) -> Result<PageImage>;
}

/// Image-load primitive used to warm precomputed page images
///
/// Both `Ok` and `Err` are terminal, settled outcomes.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<()>;
}
