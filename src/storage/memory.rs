//! In-memory object store
//!
//! Backs local development without a bucket and the router tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{ObjectMetadata, ObjectStore, StorageError, StorageObject};

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, (Option<String>, Vec<u8>)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous one under the same key
    pub fn put(&self, key: impl Into<String>, content_type: Option<&str>, data: Vec<u8>) {
        self.objects
            .write()
            .insert(key.into(), (content_type.map(str::to_string), data));
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        let objects = self.objects.read();
        let (content_type, data) = objects
            .get(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;

        Ok(StorageObject {
            metadata: ObjectMetadata {
                key: key.to_string(),
                size: data.len() as i64,
                last_modified: Some(Utc::now()),
                content_type: content_type.clone(),
                etag: None,
            },
            data: data.clone(),
        })
    }
}
