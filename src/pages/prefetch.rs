//! Prefetch coordination
//!
//! Viewers trigger prefetches from several uncoordinated signals (hover,
//! staggered look-ahead over the next documents, navigation arriving at a
//! neighbour). The coordinator collapses them so at most one pipeline runs
//! per document key at any time.
//!
//! Per key the state machine is `Idle -> InFlight -> Idle`. A prefetch that
//! finds the key cached or already in flight returns immediately. Only the
//! first caller's work is observed; later duplicates are plain no-ops and do
//! not wait for the running one.
//!
//! Prefetching is best effort. Failures are logged and swallowed.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Duration;

use super::cache::PageCache;
use super::pipeline::{PagePipeline, RenderPlan};
use super::types::PageSequence;

/// Keys with an active producer
#[derive(Clone, Default)]
pub struct InFlightSet {
    keys: Arc<Mutex<HashSet<String>>>,
    released: Arc<Notify>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a key, or `None` if another producer holds it
    ///
    /// The claim is released when the returned guard is dropped, on every
    /// exit path including panics.
    pub fn try_claim(&self, key: &str) -> Option<InFlightGuard> {
        let mut keys = self.keys.lock();
        if !keys.insert(key.to_string()) {
            return None;
        }

        Some(InFlightGuard {
            keys: self.keys.clone(),
            released: self.released.clone(),
            key: key.to_string(),
        })
    }

    /// Wait until no producer holds `key`
    ///
    /// Returns immediately when the key is not in flight.
    pub async fn wait_released(&self, key: &str) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if !self.contains(key) {
                return;
            }
            notified.await;
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// Ownership of an in-flight key
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    released: Arc<Notify>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
        self.released.notify_waiters();
    }
}

/// Result of a single prefetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// Pages were already cached
    Cached,
    /// Another prefetch holds the key
    InFlight,
    /// Pages were produced and cached
    Stored { pages: usize, warm_failures: usize },
    /// The pipeline produced no pages
    Empty,
    /// The pipeline failed; nothing was cached
    Failed,
}

/// De-duplicating, best-effort page prefetcher
#[derive(Clone)]
pub struct PrefetchCoordinator {
    cache: PageCache,
    in_flight: InFlightSet,
    pipeline: PagePipeline,
}

impl PrefetchCoordinator {
    pub fn new(cache: PageCache, in_flight: InFlightSet, pipeline: PagePipeline) -> Self {
        Self {
            cache,
            in_flight,
            pipeline,
        }
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Start a prefetch in the background
    ///
    /// Returns immediately. Failures never reach the caller.
    pub fn prefetch(&self, key: impl Into<String>) {
        let this = self.clone();
        let key = key.into();
        tokio::spawn(async move {
            this.prefetch_now(&key).await;
        });
    }

    /// Schedule prefetches for upcoming documents, `stagger` apart
    ///
    /// The first key starts right away.
    pub fn prefetch_ahead<I, K>(&self, keys: I, stagger: Duration)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for (i, key) in keys.into_iter().enumerate() {
            let this = self.clone();
            let key = key.into();
            let delay = stagger_delay(stagger, i);
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                this.prefetch_now(&key).await;
            });
        }
    }

    /// Run a prefetch to completion
    pub async fn prefetch_now(&self, key: &str) -> PrefetchOutcome {
        if self.cache.get(key).is_some() {
            return PrefetchOutcome::Cached;
        }

        // Claim before the first await
        let Some(_guard) = self.in_flight.try_claim(key) else {
            tracing::trace!(key = %key, "Prefetch already in flight");
            return PrefetchOutcome::InFlight;
        };

        // Another producer may have finished between the lookup and the claim
        if self.cache.contains(key) {
            return PrefetchOutcome::Cached;
        }

        let (pages, warm_failures) = match self.pipeline.plan(key) {
            RenderPlan::Precomputed { page_count } => {
                let pages = self.pipeline.precomputed_pages(key, page_count);
                let mut warm_failures = 0;
                if self.pipeline.config().warm_images {
                    let report = self.pipeline.warm(&pages).await;
                    warm_failures = report.failed;
                }
                (pages, warm_failures)
            }
            RenderPlan::Render => match self.pipeline.render_all(key).await {
                Ok(pages) => (pages, 0),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Prefetch failed");
                    return PrefetchOutcome::Failed;
                }
            },
        };

        if pages.is_empty() {
            return PrefetchOutcome::Empty;
        }

        let count = pages.len();
        self.cache.set(key, PageSequence::new(pages));
        tracing::debug!(key = %key, pages = count, warm_failures, "Prefetched document");

        PrefetchOutcome::Stored {
            pages: count,
            warm_failures,
        }
    }
}

/// Delay before the `index`-th look-ahead prefetch, saturating on overflow
fn stagger_delay(stagger: Duration, index: usize) -> Duration {
    u32::try_from(index)
        .ok()
        .and_then(|i| stagger.checked_mul(i))
        .unwrap_or(Duration::MAX)
}
