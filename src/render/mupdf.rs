//! MuPDF page renderer
//!
//! Fetches the document bytes from object storage and rasterizes pages to
//! inline JPEG images.
//!
//! MuPDF documents are not thread-safe. The bytes are shared, and every page
//! render opens a fresh document inside a blocking task, so no MuPDF handle
//! ever crosses threads.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use ::mupdf::{Colorspace, Document, Matrix, Pixmap};

use crate::pages::{DocumentRenderer, OpenDocument, PageError, PageImage, Result};
use crate::storage::ObjectStore;

const PDF_MIME: &str = "application/pdf";

/// Renders documents stored in an [`ObjectStore`] with MuPDF
pub struct MupdfRenderer {
    store: Arc<dyn ObjectStore>,
    scale: f32,
}

impl MupdfRenderer {
    pub fn new(store: Arc<dyn ObjectStore>, scale: f32) -> Self {
        Self {
            store,
            scale: scale.clamp(0.1, 4.0),
        }
    }
}

#[async_trait]
impl DocumentRenderer for MupdfRenderer {
    async fn open(&self, key: &str) -> Result<Box<dyn OpenDocument>> {
        let object = self.store.get_object(key).await?;
        let data = Arc::new(object.data);

        let bytes = data.clone();
        let page_count = tokio::task::spawn_blocking(move || {
            let doc = Document::from_bytes(&bytes, PDF_MIME).map_err(render_error)?;
            let count = doc.page_count().map_err(render_error)?;
            Ok::<_, PageError>(count.max(0) as usize)
        })
        .await??;

        tracing::debug!(key = %key, pages = page_count, "Opened document");

        Ok(Box::new(MupdfDocument {
            data,
            page_count,
            scale: self.scale,
        }))
    }
}

struct MupdfDocument {
    data: Arc<Vec<u8>>,
    page_count: usize,
    scale: f32,
}

#[async_trait]
impl OpenDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn render_page(&self, page: usize) -> Result<PageImage> {
        if page == 0 || page > self.page_count {
            return Err(PageError::PageRender {
                page,
                reason: format!("document has {} pages", self.page_count),
            });
        }

        let data = self.data.clone();
        let scale = self.scale;

        let jpeg = tokio::task::spawn_blocking(move || {
            let doc = Document::from_bytes(&data, PDF_MIME).map_err(render_error)?;
            let mupdf_page = doc.load_page((page - 1) as i32).map_err(render_error)?;

            let matrix = Matrix::new_scale(scale, scale);
            let colorspace = Colorspace::device_rgb();
            let pixmap = mupdf_page
                .to_pixmap(&matrix, &colorspace, false, true)
                .map_err(render_error)?;

            encode_jpeg(&pixmap).map_err(|reason| PageError::PageRender { page, reason })
        })
        .await??;

        Ok(PageImage::inline("image/jpeg", &jpeg))
    }
}

fn render_error(err: ::mupdf::Error) -> PageError {
    PageError::Render(err.to_string())
}

/// Encode an RGB(A) pixmap as JPEG, dropping any alpha channel
fn encode_jpeg(pixmap: &Pixmap) -> std::result::Result<Vec<u8>, String> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let rgb = rgb_samples(pixmap.samples(), width, height, pixmap.n() as usize)?;

    let img = RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| "pixmap size does not match its samples".to_string())?;

    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Jpeg)
        .map_err(|e| e.to_string())?;

    Ok(output)
}

/// Keep the first three components of each `n`-component pixel
fn rgb_samples(
    samples: &[u8],
    width: u32,
    height: u32,
    n: usize,
) -> std::result::Result<Vec<u8>, String> {
    if n < 3 {
        return Err(format!("unsupported pixmap with {} components", n));
    }

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| format!("pixmap of {}x{} is too large", width, height))?;

    let mut rgb = Vec::with_capacity(len.min(samples.len()));
    for pixel in samples.chunks_exact(n) {
        rgb.extend_from_slice(&pixel[..3]);
    }

    if rgb.len() != len {
        return Err(format!(
            "pixmap of {}x{} has {} samples",
            width,
            height,
            samples.len()
        ));
    }

    Ok(rgb)
}
