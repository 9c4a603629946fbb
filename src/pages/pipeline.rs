//! Page production pipeline
//!
//! Chooses between the two ways of producing a document's pages:
//!
//! - **Precomputed**: the manifest knows the page count, so the pages are
//!   the deterministic URLs of images rendered offline. Nothing is decoded.
//! - **Render**: the document is opened with the external renderer and
//!   rasterized page by page, in increasing page order.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::time::{timeout, Duration};

use super::error::{PageError, Result};
use super::manifest::ManifestStore;
use super::resolver::PageUrlResolver;
use super::traits::{DocumentRenderer, ImageLoader, OpenDocument};
use super::types::PageImage;

/// Default timeout for opening a document or rendering one page
pub const RENDER_TIMEOUT_SECS: u64 = 30;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Load every precomputed image once during prefetch
    pub warm_images: bool,
    /// Timeout for opening a document and for each page render
    pub render_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            warm_images: true,
            render_timeout_secs: RENDER_TIMEOUT_SECS,
        }
    }
}

/// How a document's pages will be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPlan {
    Precomputed { page_count: usize },
    Render,
}

/// Outcome of warming precomputed page images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub loaded: usize,
    pub failed: usize,
}

/// Shared page production logic for prefetch and direct loads
#[derive(Clone)]
pub struct PagePipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    manifest: ManifestStore,
    renderer: Arc<dyn DocumentRenderer>,
    images: Arc<dyn ImageLoader>,
    resolver: PageUrlResolver,
    config: PipelineConfig,
}

impl PagePipeline {
    pub fn new(
        manifest: ManifestStore,
        renderer: Arc<dyn DocumentRenderer>,
        images: Arc<dyn ImageLoader>,
        resolver: PageUrlResolver,
        config: PipelineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                manifest,
                renderer,
                images,
                resolver,
                config,
            }),
        }
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.inner.manifest
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Decide how to produce a document's pages
    pub fn plan(&self, key: &str) -> RenderPlan {
        match self.inner.manifest.page_count(key) {
            Some(page_count) if page_count > 0 => RenderPlan::Precomputed { page_count },
            _ => RenderPlan::Render,
        }
    }

    /// Page image references for a precomputed document
    pub fn precomputed_pages(&self, key: &str, page_count: usize) -> Vec<PageImage> {
        self.inner
            .resolver
            .page_urls(key, page_count)
            .into_iter()
            .map(PageImage::Url)
            .collect()
    }

    /// Load every image URL and wait until each one has settled
    ///
    /// A failed image counts as settled and never fails the batch.
    pub async fn warm(&self, pages: &[PageImage]) -> WarmReport {
        let loads = pages
            .iter()
            .filter_map(|page| match page {
                PageImage::Url(url) => Some(url.as_str()),
                PageImage::Inline(_) => None,
            })
            .map(|url| async move {
                let result = self.inner.images.load(url).await;
                if let Err(e) = &result {
                    tracing::debug!(url = %url, error = %e, "Page image failed to warm");
                }
                result.is_ok()
            });

        let results = join_all(loads).await;
        let loaded = results.iter().filter(|ok| **ok).count();

        WarmReport {
            loaded,
            failed: results.len() - loaded,
        }
    }

    /// Open a document with the renderer
    pub async fn open(&self, key: &str) -> Result<Box<dyn OpenDocument>> {
        let doc = self
            .with_timeout(self.inner.renderer.open(key))
            .await?;

        if doc.page_count() == 0 {
            return Err(PageError::EmptyDocument(key.to_string()));
        }

        Ok(doc)
    }

    /// Render one 1-based page of an opened document
    pub async fn render_page(&self, doc: &dyn OpenDocument, page: usize) -> Result<PageImage> {
        self.with_timeout(doc.render_page(page)).await
    }

    /// Render every page of a document in page order
    ///
    /// Fails as a whole if any page fails.
    pub async fn render_all(&self, key: &str) -> Result<Vec<PageImage>> {
        let doc = self.open(key).await?;
        let total = doc.page_count();
        let mut pages = Vec::with_capacity(total);

        for page in 1..=total {
            pages.push(self.render_page(doc.as_ref(), page).await?);
        }

        tracing::debug!(key = %key, pages = total, "Rendered document");
        Ok(pages)
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let secs = self.inner.config.render_timeout_secs;
        timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| PageError::Timeout(secs))?
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_plan_prefers_manifest() {
        let manifest = ManifestStore::new();
        manifest.set([("a.pdf", 3), ("empty.pdf", 0)].into_iter().collect());
        let pipeline = pipeline(
            manifest,
            Arc::new(FakeRenderer::new(1)),
            Arc::new(FakeImages::default()),
        );

        assert_eq!(pipeline.plan("a.pdf"), RenderPlan::Precomputed { page_count: 3 });
        assert_eq!(pipeline.plan("empty.pdf"), RenderPlan::Render);
        assert_eq!(pipeline.plan("unknown.pdf"), RenderPlan::Render);
    }

    #[test]
    fn test_precomputed_pages_follow_naming() {
        let pipeline = pipeline(
            ManifestStore::new(),
            Arc::new(FakeRenderer::new(1)),
            Arc::new(FakeImages::default()),
        );

        let pages = pipeline.precomputed_pages("a.pdf", 2);
        assert_eq!(
            pages,
            vec![
                PageImage::Url("https://cdn.test/pages/a.pdf/page-001.jpg".into()),
                PageImage::Url("https://cdn.test/pages/a.pdf/page-002.jpg".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_warm_counts_failures_as_settled() {
        let images = Arc::new(FakeImages::default());
        let pipeline = pipeline(
            ManifestStore::new(),
            Arc::new(FakeRenderer::new(1)),
            images.clone(),
        );

        let pages = vec![
            PageImage::Url("https://cdn.test/ok-1.jpg".into()),
            PageImage::Url("https://cdn.test/fail-2.jpg".into()),
            PageImage::Url("https://cdn.test/ok-3.jpg".into()),
        ];
        let report = pipeline.warm(&pages).await;

        assert_eq!(report, WarmReport { loaded: 2, failed: 1 });
        assert_eq!(images.loads(), 3);
    }

    #[tokio::test]
    async fn test_render_all_in_page_order() {
        let pipeline = pipeline(
            ManifestStore::new(),
            Arc::new(FakeRenderer::new(3)),
            Arc::new(FakeImages::default()),
        );

        let pages = pipeline.render_all("a.pdf").await.unwrap();
        let srcs: Vec<&str> = pages.iter().map(PageImage::src).collect();
        assert_eq!(srcs, vec!["a.pdf#1", "a.pdf#2", "a.pdf#3"]);
    }

    #[tokio::test]
    async fn test_render_all_fails_on_bad_page() {
        let renderer = FakeRenderer {
            failing_page: Some(2),
            ..FakeRenderer::new(3)
        };
        let pipeline = pipeline(
            ManifestStore::new(),
            Arc::new(renderer),
            Arc::new(FakeImages::default()),
        );

        let result = pipeline.render_all("a.pdf").await;
        assert!(matches!(result, Err(PageError::PageRender { page: 2, .. })));
    }

    #[tokio::test]
    async fn test_empty_document_is_an_error() {
        let pipeline = pipeline(
            ManifestStore::new(),
            Arc::new(FakeRenderer::new(0)),
            Arc::new(FakeImages::default()),
        );

        let result = pipeline.render_all("blank.pdf").await;
        assert!(matches!(result, Err(PageError::EmptyDocument(_))));
    }
}
