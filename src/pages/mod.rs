//! Document page cache and prefetching
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       PageService                         │
//! │   prefetch(key)              open(key) / load(key)        │
//! └──────────────────────────────────────────────────────────┘
//!          │                                │
//!          ▼                                ▼
//!   ┌─────────────────────┐       ┌──────────────────┐
//!   │ PrefetchCoordinator │       │    PageLoader    │
//!   │   (InFlightSet)     │       │ (LoadHandle)     │
//!   └─────────────────────┘       └──────────────────┘
//!          │          └──────┬───────────┘      │
//!          │                 ▼                  │
//!          │   ┌───────────────────────────┐    │
//!          │   │       PagePipeline        │    │
//!          │   │ ManifestStore → resolver  │    │
//!          │   │ or DocumentRenderer       │    │
//!          │   └───────────────────────────┘    │
//!          ▼                                    ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │                PageCache (LRU, bounded)              │
//!   └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let service = PageService::new(config, renderer, images, resolver)
//!     .with_manifest_source(source);
//! service.spawn_manifest_load();
//!
//! // Warm the next documents while the user reads
//! service.prefetch_ahead(next_keys, Duration::from_millis(300));
//!
//! // Open the current one with progress
//! let mut handle = service.open("docs/report.pdf");
//! while let Some(event) = handle.next().await {
//!     // update the view
//! }
//! ```

mod cache;
mod error;
mod loader;
mod manifest;
mod pipeline;
mod prefetch;
mod resolver;
mod service;
mod traits;
mod types;

pub use cache::{CacheStats, PageCache, DEFAULT_CAPACITY};
pub use error::{PageError, Result};
pub use loader::{LoadEvent, LoadHandle, LoadedPages, PageLoader};
pub use manifest::{
    FileManifestSource, HttpManifestSource, Manifest, ManifestEntry, ManifestStore,
    StorageManifestSource,
};
pub use pipeline::{PagePipeline, PipelineConfig, RenderPlan, WarmReport, RENDER_TIMEOUT_SECS};
pub use prefetch::{InFlightGuard, InFlightSet, PrefetchCoordinator, PrefetchOutcome};
pub use resolver::{page_file_name, PageUrlResolver};
pub use service::{PageService, PageServiceConfig, ServiceStats};
pub use traits::{DocumentRenderer, ImageLoader, ManifestSource, OpenDocument};
pub use types::{PageImage, PageSequence, PageSource};
