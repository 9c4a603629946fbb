//! Folio Server
//!
//! Document page server with a bounded page cache, manifest-backed page
//! images and background prefetching.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_server::config::Config;
use folio_server::pages::{
    DocumentRenderer, HttpManifestSource, ManifestSource, PageService, PageUrlResolver,
    StorageManifestSource,
};
use folio_server::render::HttpImageLoader;
use folio_server::state::AppState;
use folio_server::storage::{ObjectStore, S3Client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Folio Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("S3 endpoint: {}", config.storage.endpoint);
    tracing::info!("Page images: {}", config.pages.image_base_url);

    // Storage is optional; manifest-backed pages work without it
    let storage: Option<Arc<dyn ObjectStore>> = match S3Client::new(&config.storage).await {
        Ok(client) => {
            tracing::info!("S3 bucket: {}", client.bucket());
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("S3 storage unavailable: {}. File proxy disabled", e);
            None
        }
    };

    let resolver = PageUrlResolver::new(
        &config.pages.image_base_url,
        &config.pages.image_prefix,
        &config.pages.image_extension,
    );

    let mut service = PageService::new(
        config.page_service(),
        renderer(&config, storage.clone()),
        Arc::new(HttpImageLoader::new()),
        resolver,
    );

    if let Some(source) = manifest_source(&config, storage.clone()) {
        tracing::info!("Manifest source: {}", source.describe());
        service = service.with_manifest_source(source);
        service.spawn_manifest_load();
    } else {
        tracing::info!("No manifest configured, every document will be rendered");
    }

    let app = folio_server::app(AppState::new(service, storage));

    // Start server with graceful shutdown
    let ip: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid SERVER_HOST {:?}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    tracing::info!("Folio Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "render-mupdf")]
fn renderer(config: &Config, storage: Option<Arc<dyn ObjectStore>>) -> Arc<dyn DocumentRenderer> {
    match storage {
        Some(store) => Arc::new(folio_server::render::MupdfRenderer::new(
            store,
            config.pages.render_scale,
        )),
        None => {
            tracing::warn!("MuPDF renderer needs object storage, rendering disabled");
            Arc::new(folio_server::render::UnavailableRenderer)
        }
    }
}

#[cfg(not(feature = "render-mupdf"))]
fn renderer(_config: &Config, _storage: Option<Arc<dyn ObjectStore>>) -> Arc<dyn DocumentRenderer> {
    tracing::info!("Built without render-mupdf, only manifest documents can be loaded");
    Arc::new(folio_server::render::UnavailableRenderer)
}

/// Prefer an HTTP manifest, then one stored in the bucket
fn manifest_source(
    config: &Config,
    storage: Option<Arc<dyn ObjectStore>>,
) -> Option<Arc<dyn ManifestSource>> {
    if let Some(url) = &config.manifest.url {
        return Some(Arc::new(HttpManifestSource::new(url.clone())));
    }

    match (&config.manifest.key, storage) {
        (Some(key), Some(store)) => Some(Arc::new(StorageManifestSource::new(store, key.clone()))),
        (Some(key), None) => {
            tracing::warn!("MANIFEST_KEY {} set but storage is unavailable", key);
            None
        }
        _ => None,
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
