//! Storage module for S3-compatible backends
//!
//! Supports MinIO, Cloudflare R2, Backblaze B2, and AWS S3.

mod memory;
mod s3_client;
mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use s3_client::S3Client;
pub use types::*;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),
}

/// Read access to document objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get an object's metadata and data
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;
}
