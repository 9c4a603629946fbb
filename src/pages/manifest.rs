//! Precomputed page manifest
//!
//! The manifest records how many pre-rendered page images exist for each
//! document. Documents listed here are served from those images instead of
//! going through the renderer.
//!
//! The manifest is loaded once at startup. A missing or failed manifest is a
//! valid state: every document then takes the rendering path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::{PageError, Result};
use super::traits::ManifestSource;
use crate::storage::ObjectStore;

/// Page-count record for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub pages: usize,
}

/// Mapping from document key to its page-count record
///
/// Wire format: `{ "path/to/doc.pdf": { "pages": 12 }, ... }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document's page count
    pub fn insert(&mut self, key: impl Into<String>, pages: usize) {
        self.entries.insert(key.into(), ManifestEntry { pages });
    }

    pub fn entry(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a manifest from its JSON encoding
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| PageError::Manifest(e.to_string()))
    }
}

impl<K: Into<String>> FromIterator<(K, usize)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (K, usize)>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for (key, pages) in iter {
            manifest.insert(key, pages);
        }
        manifest
    }
}

/// Process-wide holder of the current manifest
#[derive(Clone, Default)]
pub struct ManifestStore {
    current: Arc<RwLock<Option<Arc<Manifest>>>>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole manifest
    pub fn set(&self, manifest: Manifest) {
        let count = manifest.len();
        *self.current.write() = Some(Arc::new(manifest));
        tracing::info!(documents = count, "Manifest loaded");
    }

    /// Current manifest, or `None` when it was never loaded
    pub fn get(&self) -> Option<Arc<Manifest>> {
        self.current.read().clone()
    }

    /// Known page count for a document
    pub fn page_count(&self, key: &str) -> Option<usize> {
        let current = self.current.read();
        current
            .as_ref()
            .and_then(|manifest| manifest.entry(key))
            .map(|entry| entry.pages)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Number of documents in the manifest (0 when not loaded)
    pub fn len(&self) -> usize {
        self.current.read().as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch and install the manifest from a source
    ///
    /// Failures are logged and leave the store untouched. Returns whether a
    /// manifest was installed.
    pub async fn load(&self, source: &dyn ManifestSource) -> bool {
        match source.fetch().await {
            Ok(manifest) => {
                self.set(manifest);
                true
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.describe(),
                    error = %e,
                    "Manifest unavailable, falling back to rendering"
                );
                false
            }
        }
    }
}

/// Manifest fetched over HTTP
pub struct HttpManifestSource {
    client: reqwest::Client,
    url: String,
}

impl HttpManifestSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(&self) -> Result<Manifest> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PageError::Manifest(format!("Failed to fetch manifest: {}", e)))?;

        if !response.status().is_success() {
            return Err(PageError::Manifest(format!(
                "Manifest request returned {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PageError::Manifest(format!("Failed to read manifest: {}", e)))?;

        Manifest::from_json(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Manifest stored as an object in the document bucket
pub struct StorageManifestSource {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl StorageManifestSource {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl ManifestSource for StorageManifestSource {
    async fn fetch(&self) -> Result<Manifest> {
        let object = self.store.get_object(&self.key).await?;
        Manifest::from_json(&object.data)
    }

    fn describe(&self) -> String {
        format!("object {}", self.key)
    }
}

/// Manifest read from a local JSON file
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch(&self) -> Result<Manifest> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PageError::Manifest(format!("{}: {}", self.path.display(), e)))?;
        Manifest::from_json(&data)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::io::Write;

    struct FailingSource;

    #[async_trait]
    impl ManifestSource for FailingSource {
        async fn fetch(&self) -> Result<Manifest> {
            Err(PageError::Manifest("unreachable".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    #[test]
    fn test_page_count_before_load() {
        let store = ManifestStore::new();
        assert!(store.get().is_none());
        assert_eq!(store.page_count("a.pdf"), None);
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_set_replaces_manifest() {
        let store = ManifestStore::new();
        store.set([("a.pdf", 3)].into_iter().collect());
        store.set([("b.pdf", 5)].into_iter().collect());

        assert_eq!(store.page_count("a.pdf"), None);
        assert_eq!(store.page_count("b.pdf"), Some(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_parse_wire_format() {
        let json = br#"{"docs/a.pdf": {"pages": 12}, "docs/b.pdf": {"pages": 1}}"#;
        let manifest = Manifest::from_json(json).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entry("docs/a.pdf"), Some(&ManifestEntry { pages: 12 }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = Manifest::from_json(b"[1, 2, 3]");
        assert!(matches!(result, Err(PageError::Manifest(_))));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_an_error() {
        let store = ManifestStore::new();
        assert!(!store.load(&FailingSource).await);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_manifest() {
        let store = ManifestStore::new();
        store.set([("a.pdf", 2)].into_iter().collect());

        assert!(!store.load(&FailingSource).await);
        assert_eq!(store.page_count("a.pdf"), Some(2));
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"scans/report.pdf": {"pages": 7}}"#).unwrap();

        let store = ManifestStore::new();
        assert!(store.load(&FileManifestSource::new(file.path())).await);
        assert_eq!(store.page_count("scans/report.pdf"), Some(7));
    }

    #[tokio::test]
    async fn test_missing_file_source() {
        let store = ManifestStore::new();
        let source = FileManifestSource::new("/nonexistent/manifest.json");
        assert!(!store.load(&source).await);
    }

    #[tokio::test]
    async fn test_storage_source() {
        let objects = MemoryStore::new();
        objects.put(
            "meta/manifest.json",
            Some("application/json"),
            br#"{"books/a.pdf": {"pages": 4}}"#.to_vec(),
        );
        let source = StorageManifestSource::new(Arc::new(objects), "meta/manifest.json");

        let store = ManifestStore::new();
        assert!(store.load(&source).await);
        assert_eq!(store.page_count("books/a.pdf"), Some(4));
        assert_eq!(source.describe(), "object meta/manifest.json");
    }

    #[tokio::test]
    async fn test_missing_storage_source() {
        let source = StorageManifestSource::new(Arc::new(MemoryStore::new()), "meta/manifest.json");

        let store = ManifestStore::new();
        assert!(!store.load(&source).await);
        assert!(!store.is_loaded());
    }
}
