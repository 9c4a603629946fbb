//! HTTP image loader
//!
//! Warms pre-rendered page images by fetching them once, so the CDN or proxy
//! in front of the bucket has them ready when a viewer asks.

use async_trait::async_trait;

use crate::pages::{ImageLoader, PageError, Result};

pub struct HttpImageLoader {
    client: reqwest::Client,
}

impl Default for HttpImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpImageLoader {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await.map_err(|e| PageError::ImageLoad {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::ImageLoad {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        // Drain the body so the response is fully transferred
        response.bytes().await.map_err(|e| PageError::ImageLoad {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_settles_as_error() {
        let loader = HttpImageLoader::new();
        let result = loader.load("http://127.0.0.1:9/page-001.jpg").await;
        assert!(matches!(result, Err(PageError::ImageLoad { .. })));
    }
}
