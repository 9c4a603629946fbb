//! Direct page loading for an active viewer
//!
//! Unlike prefetching, a direct load reports progress and failures back to
//! the caller. The load runs on its own task and streams [`LoadEvent`]s
//! through a [`LoadHandle`]:
//!
//! ```text
//! Started { total } -> Page { 1 } -> Page { 2 } -> ... -> Ready
//!                                                    \-> Failed
//! ```
//!
//! Cancelling the handle (or dropping it) stops further events and state
//! writes. Renderer calls already issued are not aborted; the load stops at
//! the next page boundary and nothing is cached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;

use super::cache::PageCache;
use super::pipeline::{PagePipeline, RenderPlan};
use super::prefetch::InFlightSet;
use super::types::{PageImage, PageSequence, PageSource};

const EVENT_BUFFER: usize = 16;

/// Progress of a direct load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// The page count is known
    Started { total: usize, source: PageSource },
    /// One more page is available, in page order
    Page { number: usize, image: PageImage },
    /// All pages are available
    Ready { pages: PageSequence, source: PageSource },
    /// The load failed
    Failed { message: String },
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadEvent::Ready { .. } | LoadEvent::Failed { .. })
    }
}

/// Completed direct load
#[derive(Debug, Clone)]
pub struct LoadedPages {
    pub pages: PageSequence,
    pub source: PageSource,
}

/// Receiving side of a direct load
pub struct LoadHandle {
    key: String,
    events: mpsc::Receiver<LoadEvent>,
    cancelled: Arc<AtomicBool>,
}

impl LoadHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next progress event, `None` once the load has ended
    pub async fn next(&mut self) -> Option<LoadEvent> {
        self.events.recv().await
    }

    /// Stop receiving events for this load
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for the terminal event
    ///
    /// Returns the failure message on error.
    pub async fn finish(mut self) -> Result<LoadedPages, String> {
        while let Some(event) = self.next().await {
            match event {
                LoadEvent::Ready { pages, source } => return Ok(LoadedPages { pages, source }),
                LoadEvent::Failed { message } => return Err(message),
                LoadEvent::Started { .. } | LoadEvent::Page { .. } => {}
            }
        }
        Err(format!("Load of {} ended without a result", self.key))
    }

    /// Turn the handle into a stream of events
    ///
    /// Dropping the stream cancels the load.
    pub fn into_stream(self) -> impl Stream<Item = LoadEvent> + Send {
        futures::stream::unfold(self, |mut handle| async move {
            let event = handle.next().await?;
            Some((event, handle))
        })
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sending side of a direct load
struct EventSink {
    tx: mpsc::Sender<LoadEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    /// Deliver an event; `false` once the viewer went away
    async fn emit(&self, event: LoadEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }
}

/// Get-or-load path: cache, then manifest, then renderer
///
/// A document that a prefetch is already rendering is not rendered twice:
/// the load waits for that prefetch and serves its result from the cache.
#[derive(Clone)]
pub struct PageLoader {
    cache: PageCache,
    in_flight: InFlightSet,
    pipeline: PagePipeline,
}

impl PageLoader {
    pub fn new(cache: PageCache, in_flight: InFlightSet, pipeline: PagePipeline) -> Self {
        Self {
            cache,
            in_flight,
            pipeline,
        }
    }

    /// Start loading a document's pages
    pub fn open(&self, key: impl Into<String>) -> LoadHandle {
        let key = key.into();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancelled = Arc::new(AtomicBool::new(false));

        let sink = EventSink {
            tx,
            cancelled: cancelled.clone(),
        };
        let this = self.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            this.run(&task_key, sink).await;
        });

        LoadHandle {
            key,
            events: rx,
            cancelled,
        }
    }

    async fn run(&self, key: &str, sink: EventSink) {
        if let Some(pages) = self.cache.get(key) {
            return serve_cached(key, pages, &sink).await;
        }

        match self.pipeline.plan(key) {
            RenderPlan::Precomputed { page_count } => {
                let pages = self.pipeline.precomputed_pages(key, page_count);
                self.deliver(key, pages, PageSource::Manifest, &sink).await;
            }
            RenderPlan::Render => {
                if self.in_flight.contains(key) {
                    tracing::debug!(key = %key, "Waiting for in-flight prefetch");
                    self.in_flight.wait_released(key).await;

                    if let Some(pages) = self.cache.get(key) {
                        return serve_cached(key, pages, &sink).await;
                    }
                    if sink.is_cancelled() {
                        return cancelled(key);
                    }
                }
                self.render(key, &sink).await
            }
        }
    }

    async fn render(&self, key: &str, sink: &EventSink) {
        let doc = match self.pipeline.open(key).await {
            Ok(doc) => doc,
            Err(e) => return fail(key, &e, sink).await,
        };

        let total = doc.page_count();
        if !sink
            .emit(LoadEvent::Started {
                total,
                source: PageSource::Rendered,
            })
            .await
        {
            return cancelled(key);
        }

        let mut pages = Vec::with_capacity(total);
        for number in 1..=total {
            let image = match self.pipeline.render_page(doc.as_ref(), number).await {
                Ok(image) => image,
                Err(e) => return fail(key, &e, sink).await,
            };

            if !sink
                .emit(LoadEvent::Page {
                    number,
                    image: image.clone(),
                })
                .await
            {
                return cancelled(key);
            }
            pages.push(image);
        }

        if sink.is_cancelled() {
            return cancelled(key);
        }

        let pages = PageSequence::new(pages);
        self.cache.set(key, pages.clone());
        sink.emit(LoadEvent::Ready {
            pages,
            source: PageSource::Rendered,
        })
        .await;
    }

    async fn deliver(&self, key: &str, pages: Vec<PageImage>, source: PageSource, sink: &EventSink) {
        if !sink
            .emit(LoadEvent::Started {
                total: pages.len(),
                source,
            })
            .await
        {
            return cancelled(key);
        }

        for (i, image) in pages.iter().enumerate() {
            let event = LoadEvent::Page {
                number: i + 1,
                image: image.clone(),
            };
            if !sink.emit(event).await {
                return cancelled(key);
            }
        }

        if sink.is_cancelled() {
            return cancelled(key);
        }

        let pages = PageSequence::new(pages);
        self.cache.set(key, pages.clone());
        sink.emit(LoadEvent::Ready { pages, source }).await;
    }
}

async fn serve_cached(key: &str, pages: PageSequence, sink: &EventSink) {
    tracing::debug!(key = %key, "Serving pages from cache");
    sink.emit(LoadEvent::Started {
        total: pages.len(),
        source: PageSource::Cache,
    })
    .await;
    sink.emit(LoadEvent::Ready {
        pages,
        source: PageSource::Cache,
    })
    .await;
}

async fn fail(key: &str, error: &super::PageError, sink: &EventSink) {
    tracing::warn!(key = %key, error = %error, "Failed to load document");
    sink.emit(LoadEvent::Failed {
        message: format!("Failed to load {}: {}", key, error),
    })
    .await;
}

fn cancelled(key: &str) {
    tracing::debug!(key = %key, "Load cancelled");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use tokio::sync::Notify;

    use super::*;
    use crate::pages::manifest::ManifestStore;
    use crate::pages::pipeline::testing::*;

    fn loader(renderer: Arc<FakeRenderer>, manifest: ManifestStore) -> (PageLoader, PageCache) {
        let cache = PageCache::new();
        let pipeline = pipeline(manifest, renderer, Arc::new(FakeImages::default()));
        (PageLoader::new(cache.clone(), InFlightSet::new(), pipeline), cache)
    }

    async fn collect(mut handle: LoadHandle) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_render_reports_pages_progressively() {
        let renderer = Arc::new(FakeRenderer::new(2));
        let (loader, cache) = loader(renderer, ManifestStore::new());

        let events = collect(loader.open("a.pdf")).await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            LoadEvent::Started {
                total: 2,
                source: PageSource::Rendered
            }
        );
        assert_eq!(
            events[1],
            LoadEvent::Page {
                number: 1,
                image: PageImage::Inline("a.pdf#1".into())
            }
        );
        assert!(matches!(events[2], LoadEvent::Page { number: 2, .. }));
        assert!(matches!(
            events[3],
            LoadEvent::Ready {
                source: PageSource::Rendered,
                ..
            }
        ));
        assert!(cache.contains("a.pdf"));
    }

    #[tokio::test]
    async fn test_cached_pages_skip_renderer() {
        let renderer = Arc::new(FakeRenderer::new(2));
        let (loader, cache) = loader(renderer.clone(), ManifestStore::new());
        cache.set("a.pdf", PageSequence::new(vec![PageImage::Url("x".into())]));

        let loaded = loader.open("a.pdf").finish().await.unwrap();

        assert_eq!(loaded.source, PageSource::Cache);
        assert_eq!(loaded.pages.len(), 1);
        assert_eq!(renderer.opens(), 0);
    }

    #[tokio::test]
    async fn test_manifest_preferred_over_renderer() {
        let renderer = Arc::new(FakeRenderer::new(5));
        let manifest = ManifestStore::new();
        manifest.set([("m.pdf", 2)].into_iter().collect());
        let (loader, cache) = loader(renderer.clone(), manifest);

        let loaded = loader.open("m.pdf").finish().await.unwrap();

        assert_eq!(loaded.source, PageSource::Manifest);
        assert_eq!(
            loaded.pages.page(2).map(PageImage::src),
            Some("https://cdn.test/pages/m.pdf/page-002.jpg")
        );
        assert_eq!(renderer.opens(), 0);
        assert!(cache.contains("m.pdf"));
    }

    #[tokio::test]
    async fn test_failure_is_a_distinct_state() {
        let renderer = Arc::new(FakeRenderer::new(2));
        renderer.fail_on("bad.pdf");
        let (loader, cache) = loader(renderer, ManifestStore::new());

        let events = collect(loader.open("bad.pdf")).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            LoadEvent::Failed { message } => assert!(message.contains("bad.pdf")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!cache.contains("bad.pdf"));
    }

    #[tokio::test]
    async fn test_page_failure_after_progress() {
        let renderer = Arc::new(FakeRenderer {
            failing_page: Some(2),
            ..FakeRenderer::new(3)
        });
        let (loader, cache) = loader(renderer, ManifestStore::new());

        let events = collect(loader.open("c.pdf")).await;

        assert!(matches!(events[1], LoadEvent::Page { number: 1, .. }));
        assert!(matches!(events.last(), Some(LoadEvent::Failed { .. })));
        assert!(!cache.contains("c.pdf"));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_events_and_cache_write() {
        let gate = Arc::new(Notify::new());
        let renderer = Arc::new(FakeRenderer::gated(3, gate.clone()));
        let (loader, cache) = loader(renderer.clone(), ManifestStore::new());

        let mut handle = loader.open("slow.pdf");
        while renderer.opens() == 0 {
            tokio::task::yield_now().await;
        }

        handle.cancel();
        gate.notify_one();

        assert_eq!(handle.next().await, None);
        assert!(handle.is_cancelled());
        assert!(!cache.contains("slow.pdf"));
    }

    #[tokio::test]
    async fn test_stream_yields_until_terminal() {
        let renderer = Arc::new(FakeRenderer::new(1));
        let (loader, _cache) = loader(renderer, ManifestStore::new());

        let events: Vec<LoadEvent> = loader.open("s.pdf").into_stream().collect().await;

        assert_eq!(events.len(), 3);
        assert!(events.last().map(LoadEvent::is_terminal).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_zero_page_manifest_entry_renders() {
        let renderer = Arc::new(FakeRenderer::new(1));
        let manifest = ManifestStore::new();
        manifest.set([("blank.pdf", 0)].into_iter().collect());
        let (loader, cache) = loader(renderer.clone(), manifest);

        let loaded = loader.open("blank.pdf").finish().await.unwrap();

        assert_eq!(loaded.source, PageSource::Rendered);
        assert_eq!(renderer.opens(), 1);
        assert!(cache.contains("blank.pdf"));
    }

    #[tokio::test]
    async fn test_renders_after_in_flight_producer_gives_up() {
        let renderer = Arc::new(FakeRenderer::new(1));
        let cache = PageCache::new();
        let in_flight = InFlightSet::new();
        let pipeline = pipeline(ManifestStore::new(), renderer.clone(), Arc::new(FakeImages::default()));
        let loader = PageLoader::new(cache.clone(), in_flight.clone(), pipeline);

        let guard = in_flight.try_claim("w.pdf").unwrap();
        let load = tokio::spawn(loader.open("w.pdf").finish());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(renderer.opens(), 0);

        // Producer ends without caching anything
        drop(guard);
        let loaded = load.await.unwrap().unwrap();

        assert_eq!(loaded.source, PageSource::Rendered);
        assert_eq!(renderer.opens(), 1);
        assert!(cache.contains("w.pdf"));
    }
}
