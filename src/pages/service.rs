//! Page service
//!
//! One instance per process, created at startup and shared by handle. It owns
//! the page cache, the manifest store and the in-flight set, and exposes the
//! prefetch and direct-load entry points built on top of them.

use std::sync::Arc;

use tokio::time::Duration;

use super::cache::{CacheStats, PageCache};
use super::loader::{LoadHandle, LoadedPages, PageLoader};
use super::manifest::ManifestStore;
use super::pipeline::{PagePipeline, PipelineConfig};
use super::prefetch::{InFlightSet, PrefetchCoordinator, PrefetchOutcome};
use super::resolver::PageUrlResolver;
use super::traits::{DocumentRenderer, ImageLoader, ManifestSource};

/// Page service configuration
#[derive(Debug, Clone)]
pub struct PageServiceConfig {
    /// Maximum number of documents held in the page cache
    pub cache_capacity: usize,
    pub pipeline: PipelineConfig,
}

impl Default for PageServiceConfig {
    fn default() -> Self {
        Self {
            cache_capacity: super::cache::DEFAULT_CAPACITY.get(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Shared page cache, manifest and prefetch state
#[derive(Clone)]
pub struct PageService {
    cache: PageCache,
    manifest: ManifestStore,
    prefetcher: PrefetchCoordinator,
    loader: PageLoader,
    manifest_source: Option<Arc<dyn ManifestSource>>,
}

impl PageService {
    pub fn new(
        config: PageServiceConfig,
        renderer: Arc<dyn DocumentRenderer>,
        images: Arc<dyn ImageLoader>,
        resolver: PageUrlResolver,
    ) -> Self {
        let cache = PageCache::with_capacity(config.cache_capacity);
        let manifest = ManifestStore::new();
        let pipeline = PagePipeline::new(
            manifest.clone(),
            renderer,
            images,
            resolver,
            config.pipeline,
        );

        let in_flight = InFlightSet::new();

        Self {
            prefetcher: PrefetchCoordinator::new(cache.clone(), in_flight.clone(), pipeline.clone()),
            loader: PageLoader::new(cache.clone(), in_flight, pipeline),
            cache,
            manifest,
            manifest_source: None,
        }
    }

    /// Attach the source used by [`PageService::reload_manifest`]
    pub fn with_manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.manifest_source = Some(source);
        self
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.manifest
    }

    pub fn in_flight(&self) -> &InFlightSet {
        self.prefetcher.in_flight()
    }

    /// Fetch the manifest from the configured source
    ///
    /// Returns whether a manifest was installed. Without a source this is a
    /// no-op and every document takes the rendering path.
    pub async fn reload_manifest(&self) -> bool {
        match &self.manifest_source {
            Some(source) => self.manifest.load(source.as_ref()).await,
            None => {
                tracing::debug!("No manifest source configured");
                false
            }
        }
    }

    /// Load the manifest in the background
    pub fn spawn_manifest_load(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            this.reload_manifest().await;
        });
    }

    /// Fire-and-forget prefetch
    pub fn prefetch(&self, key: impl Into<String>) {
        self.prefetcher.prefetch(key);
    }

    /// Staggered look-ahead prefetch
    pub fn prefetch_ahead<I, K>(&self, keys: I, stagger: Duration)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.prefetcher.prefetch_ahead(keys, stagger);
    }

    /// Run one prefetch to completion
    pub async fn prefetch_now(&self, key: &str) -> PrefetchOutcome {
        self.prefetcher.prefetch_now(key).await
    }

    /// Start a direct load with progress events
    pub fn open(&self, key: impl Into<String>) -> LoadHandle {
        self.loader.open(key)
    }

    /// Direct load, waiting for the result
    pub async fn load(&self, key: impl Into<String>) -> Result<LoadedPages, String> {
        self.open(key).finish().await
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            cache: self.cache.stats(),
            in_flight: self.in_flight().len(),
            manifest_loaded: self.manifest.is_loaded(),
            manifest_documents: self.manifest.len(),
        }
    }
}

/// Snapshot of the page service state
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub in_flight: usize,
    pub manifest_loaded: bool,
    pub manifest_documents: usize,
}
