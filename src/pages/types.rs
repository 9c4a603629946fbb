//! Page data types

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

/// A single rendered page image
///
/// Either a reference to an image that already exists at a URL (manifest-backed
/// pages) or an inline `data:` URI produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "src", rename_all = "camelCase")]
pub enum PageImage {
    Url(String),
    Inline(String),
}

impl PageImage {
    /// Encode raw image bytes as an inline data URI
    pub fn inline(mime: &str, data: &[u8]) -> Self {
        PageImage::Inline(format!("data:{};base64,{}", mime, BASE64.encode(data)))
    }

    /// The value a viewer puts in an `<img src>`
    pub fn src(&self) -> &str {
        match self {
            PageImage::Url(url) => url,
            PageImage::Inline(data) => data,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, PageImage::Inline(_))
    }
}

/// Ordered, immutable sequence of page images for one document
///
/// Page numbers are 1-based and follow document order. Cloning is cheap, so
/// the same sequence can be handed out from the cache to many readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSequence {
    pages: Arc<[PageImage]>,
}

impl PageSequence {
    pub fn new(pages: Vec<PageImage>) -> Self {
        Self {
            pages: pages.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get a page by its 1-based page number
    pub fn page(&self, number: usize) -> Option<&PageImage> {
        number.checked_sub(1).and_then(|idx| self.pages.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageImage> {
        self.pages.iter()
    }

    pub fn as_slice(&self) -> &[PageImage] {
        &self.pages
    }
}

impl From<Vec<PageImage>> for PageSequence {
    fn from(pages: Vec<PageImage>) -> Self {
        Self::new(pages)
    }
}

/// Where a loaded page sequence came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Cache,
    Manifest,
    Rendered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers_are_one_based() {
        let pages = PageSequence::new(vec![
            PageImage::Url("a".into()),
            PageImage::Url("b".into()),
        ]);

        assert_eq!(pages.page(0), None);
        assert_eq!(pages.page(1).map(PageImage::src), Some("a"));
        assert_eq!(pages.page(2).map(PageImage::src), Some("b"));
        assert_eq!(pages.page(3), None);
    }

    #[test]
    fn test_inline_image_is_data_uri() {
        let image = PageImage::inline("image/jpeg", b"abc");
        assert!(image.is_inline());
        assert_eq!(image.src(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn test_clone_shares_storage() {
        let pages = PageSequence::new(vec![PageImage::Url("a".into())]);
        let copy = pages.clone();
        assert!(std::ptr::eq(pages.as_slice(), copy.as_slice()));
    }

    #[test]
    fn test_page_image_serializes_with_kind() {
        let json = serde_json::to_value(PageImage::Url("https://x/page-001.jpg".into())).unwrap();
        assert_eq!(json["kind"], "url");
        assert_eq!(json["src"], "https://x/page-001.jpg");
    }
}
