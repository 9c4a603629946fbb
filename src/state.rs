//! Application state management

use std::sync::Arc;

use crate::pages::PageService;
use crate::storage::ObjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pages: PageService,
    storage: Option<Arc<dyn ObjectStore>>,
}

impl AppState {
    /// Create a new application state
    ///
    /// `storage` is `None` when no bucket is reachable; the file proxy then
    /// answers 503 while page loading keeps working from the manifest.
    pub fn new(pages: PageService, storage: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pages,
                storage,
            }),
        }
    }

    /// Get the page service
    pub fn pages(&self) -> &PageService {
        &self.inner.pages
    }

    /// Get the object store, if one is configured
    pub fn storage(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.inner.storage.as_ref()
    }
}
