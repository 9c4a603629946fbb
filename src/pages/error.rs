//! Page pipeline error types

use thiserror::Error;

/// Errors raised while producing the pages of a document
#[derive(Debug, Error)]
pub enum PageError {
    /// The renderer failed to open or rasterize the document
    #[error("Render error: {0}")]
    Render(String),

    /// A single page failed to render
    #[error("Page {page} failed to render: {reason}")]
    PageRender { page: usize, reason: String },

    /// No renderer is configured for documents outside the manifest
    #[error("No renderer available for {0}")]
    RendererUnavailable(String),

    /// The document has no pages
    #[error("Document has no pages: {0}")]
    EmptyDocument(String),

    /// Document bytes could not be fetched
    #[error("Storage error: {0}")]
    Storage(String),

    /// Manifest could not be fetched or decoded
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// An image URL failed to load
    #[error("Image load failed for {url}: {reason}")]
    ImageLoad { url: String, reason: String },

    /// Operation exceeded its time budget
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(String),
}

/// Result type alias for page operations
pub type Result<T> = std::result::Result<T, PageError>;

impl From<tokio::task::JoinError> for PageError {
    fn from(err: tokio::task::JoinError) -> Self {
        PageError::Join(err.to_string())
    }
}

impl From<crate::storage::StorageError> for PageError {
    fn from(err: crate::storage::StorageError) -> Self {
        PageError::Storage(err.to_string())
    }
}
