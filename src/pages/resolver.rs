//! Pre-rendered page image URLs
//!
//! Offline rasterization writes page images next to a per-document folder:
//! `{base}/{prefix}/{document key}/page-007.jpg`.

/// Deterministic `(document key, page number) -> URL` mapping
#[derive(Debug, Clone)]
pub struct PageUrlResolver {
    base_url: String,
    prefix: String,
    extension: String,
}

impl PageUrlResolver {
    pub fn new(base_url: &str, prefix: &str, extension: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// URL of a 1-based page image
    pub fn page_url(&self, key: &str, page: usize) -> String {
        let key = encode_key(key);
        let file = page_file_name(page, &self.extension);

        if self.prefix.is_empty() {
            format!("{}/{}/{}", self.base_url, key, file)
        } else {
            format!("{}/{}/{}/{}", self.base_url, self.prefix, key, file)
        }
    }

    /// URLs for pages `1..=page_count`
    pub fn page_urls(&self, key: &str, page_count: usize) -> Vec<String> {
        (1..=page_count).map(|page| self.page_url(key, page)).collect()
    }
}

/// `page-007.jpg` style file name
pub fn page_file_name(page: usize, extension: &str) -> String {
    format!("page-{:03}.{}", page, extension)
}

/// Percent-encode each path segment, keeping the `/` separators
fn encode_key(key: &str) -> String {
    key.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padded_page_number() {
        assert_eq!(page_file_name(7, "jpg"), "page-007.jpg");
        assert_eq!(page_file_name(42, "jpg"), "page-042.jpg");
        assert_eq!(page_file_name(123, "webp"), "page-123.webp");
        assert_eq!(page_file_name(1234, "jpg"), "page-1234.jpg");
    }

    #[test]
    fn test_page_url() {
        let resolver = PageUrlResolver::new("https://cdn.example.com/", "/pages/", ".jpg");
        assert_eq!(
            resolver.page_url("docs/a.pdf", 7),
            "https://cdn.example.com/pages/docs/a.pdf/page-007.jpg"
        );
    }

    #[test]
    fn test_page_url_without_prefix() {
        let resolver = PageUrlResolver::new("https://cdn.example.com", "", "jpg");
        assert_eq!(
            resolver.page_url("a.pdf", 1),
            "https://cdn.example.com/a.pdf/page-001.jpg"
        );
    }

    #[test]
    fn test_key_segments_are_encoded() {
        let resolver = PageUrlResolver::new("https://cdn.example.com", "pages", "jpg");
        assert_eq!(
            resolver.page_url("court files/exhibit #2.pdf", 1),
            "https://cdn.example.com/pages/court%20files/exhibit%20%232.pdf/page-001.jpg"
        );
    }

    #[test]
    fn test_page_urls_in_order() {
        let resolver = PageUrlResolver::new("https://cdn.example.com", "pages", "jpg");
        let urls = resolver.page_urls("a.pdf", 3);
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("page-001.jpg"));
        assert!(urls[2].ends_with("page-003.jpg"));
    }
}
