//! Configuration management for Folio Server

use serde::Deserialize;
use std::env;

use crate::pages::{PageServiceConfig, PipelineConfig, DEFAULT_CAPACITY, RENDER_TIMEOUT_SECS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pages: PagesConfig,
    pub manifest: ManifestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Minio,
        }
    }

    /// MinIO and other self-hosted endpoints need path-style addressing
    pub fn path_style(self) -> bool {
        !matches!(self, StorageProvider::S3)
    }
}

/// Page cache, pre-rendered images and renderer settings
#[derive(Debug, Clone, Deserialize)]
pub struct PagesConfig {
    /// Documents kept in the page cache
    pub cache_capacity: usize,
    /// Public base URL of pre-rendered page images
    pub image_base_url: String,
    /// Folder under the base URL holding one folder per document
    pub image_prefix: String,
    pub image_extension: String,
    /// Load precomputed page images during prefetch
    pub warm_images: bool,
    pub render_timeout_secs: u64,
    /// Rasterization scale for rendered pages (1.0 = 72 dpi)
    pub render_scale: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestConfig {
    /// Fetch the manifest over HTTP
    pub url: Option<String>,
    /// Otherwise read it from this object in the bucket
    pub key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "documents".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            pages: PagesConfig::default(),
            manifest: ManifestConfig::default(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        PagesConfig {
            cache_capacity: DEFAULT_CAPACITY.get(),
            image_base_url: "http://localhost:9000/documents".to_string(),
            image_prefix: "pages".to_string(),
            image_extension: "jpg".to_string(),
            warm_images: true,
            render_timeout_secs: RENDER_TIMEOUT_SECS,
            render_scale: 1.5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let pages = PagesConfig::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000),
            },
            storage: StorageConfig {
                provider: StorageProvider::parse(
                    &env::var("S3_PROVIDER").unwrap_or_else(|_| "minio".to_string()),
                ),
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            },
            pages: PagesConfig {
                cache_capacity: parse_var("PAGE_CACHE_CAPACITY", pages.cache_capacity),
                image_base_url: env::var("PAGE_IMAGE_BASE_URL").unwrap_or(pages.image_base_url),
                image_prefix: env::var("PAGE_IMAGE_PREFIX").unwrap_or(pages.image_prefix),
                image_extension: env::var("PAGE_IMAGE_EXTENSION").unwrap_or(pages.image_extension),
                warm_images: parse_var("PREFETCH_WARM_IMAGES", pages.warm_images),
                render_timeout_secs: parse_var("RENDER_TIMEOUT_SECS", pages.render_timeout_secs),
                render_scale: parse_var("RENDER_SCALE", pages.render_scale),
            },
            manifest: ManifestConfig {
                url: env::var("MANIFEST_URL").ok().filter(|v| !v.is_empty()),
                key: env::var("MANIFEST_KEY").ok().filter(|v| !v.is_empty()),
            },
        })
    }

    /// Settings for the page service
    pub fn page_service(&self) -> PageServiceConfig {
        PageServiceConfig {
            cache_capacity: self.pages.cache_capacity,
            pipeline: PipelineConfig {
                warm_images: self.pages.warm_images,
                render_timeout_secs: self.pages.render_timeout_secs,
            },
        }
    }
}

/// Parse an optional variable, keeping the default when unset or malformed
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}
