use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReaderError;
use crate::textflow::TextItem;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f1a7c42-8d15-5e09-b7d3-2a6c91e04f88").expect("valid namespace UUID")
});

/// Stable identifier for an opened document, derived from its bytes so that
/// re-uploading the same file yields the same id.
pub fn document_id_for_bytes(bytes: &[u8]) -> DocumentId {
    Uuid::new_v5(&DOCUMENT_NAMESPACE, bytes)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub page_count: usize,
    pub metadata: DocumentMetadata,
}

/// Page dimensions in device pixels at a given scale. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn scaled(&self, scale: f32) -> Self {
        Self::new(self.width * scale, self.height * scale)
    }

    /// Pixel dimensions a raster backing this viewport must have.
    pub fn pixel_dimensions(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
        }
    }
}

/// RGBA raster produced by a page render.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// A white raster of the given dimensions, used before the first page
    /// render completes.
    pub fn blank(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0xff; (width * height * 4) as usize],
        }
    }

    pub fn matches_viewport(&self, viewport: &Viewport) -> bool {
        let (w, h) = viewport.pixel_dimensions();
        self.width == w && self.height == h
    }
}

/// One opened document. Implementations wrap the external rendering library;
/// all operations are per-page and isolated, so a failure on one page never
/// affects another.
pub trait DocumentSession: Send + Sync {
    fn info(&self) -> &DocumentInfo;

    /// Page dimensions at the given scale factor.
    fn viewport(&self, page_index: usize, scale: f32) -> Result<Viewport, ReaderError>;

    fn render_page(&self, request: RenderRequest) -> Result<RasterImage, ReaderError>;

    /// Positioned text items for a page, in PDF coordinate space
    /// (y grows upward; x/y give the item's left/baseline position).
    fn text_items(&self, page_index: usize) -> Result<Vec<TextItem>, ReaderError>;
}

#[async_trait::async_trait]
pub trait DocumentOpener: Send + Sync {
    /// Opens a document from raw bytes. Dropping the previous session
    /// releases its decode resources; callers replace, never keep two.
    async fn open_bytes(&self, bytes: Vec<u8>) -> Result<Arc<dyn DocumentSession>, ReaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_stable_for_same_bytes() {
        let bytes = b"%PDF-1.7 fake";
        assert_eq!(document_id_for_bytes(bytes), document_id_for_bytes(bytes));
    }

    #[test]
    fn document_id_differs_for_different_bytes() {
        assert_ne!(
            document_id_for_bytes(b"%PDF-1.7 one"),
            document_id_for_bytes(b"%PDF-1.7 two")
        );
    }

    #[test]
    fn viewport_pixel_dimensions_round() {
        let natural = Viewport::new(600.0, 800.0);
        let scaled = natural.scaled(1.5);
        assert_eq!(scaled.pixel_dimensions(), (900, 1200));

        let odd = Viewport::new(612.5, 791.3).scaled(0.4);
        assert_eq!(odd.pixel_dimensions(), (245, 317));
    }

    struct ByteSession {
        info: DocumentInfo,
    }

    impl DocumentSession for ByteSession {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn viewport(&self, _page_index: usize, scale: f32) -> Result<Viewport, ReaderError> {
            Ok(Viewport::new(600.0, 800.0).scaled(scale))
        }

        fn render_page(&self, _request: RenderRequest) -> Result<RasterImage, ReaderError> {
            Ok(RasterImage::blank(1, 1))
        }

        fn text_items(&self, _page_index: usize) -> Result<Vec<TextItem>, ReaderError> {
            Ok(Vec::new())
        }
    }

    struct FakeOpener;

    #[async_trait::async_trait]
    impl DocumentOpener for FakeOpener {
        async fn open_bytes(
            &self,
            bytes: Vec<u8>,
        ) -> Result<Arc<dyn DocumentSession>, ReaderError> {
            if !bytes.starts_with(b"%PDF") {
                return Err(ReaderError::DocumentLoad("not a pdf".into()));
            }
            Ok(Arc::new(ByteSession {
                info: DocumentInfo {
                    id: document_id_for_bytes(&bytes),
                    page_count: 1,
                    metadata: DocumentMetadata::default(),
                },
            }))
        }
    }

    #[tokio::test]
    async fn opener_derives_id_from_payload() {
        let bytes = b"%PDF-1.7 payload".to_vec();
        let session = FakeOpener.open_bytes(bytes.clone()).await.unwrap();
        assert_eq!(session.info().id, document_id_for_bytes(&bytes));
    }

    #[tokio::test]
    async fn opener_rejects_non_pdf_payloads() {
        let err = FakeOpener.open_bytes(b"plain text".to_vec()).await;
        assert!(matches!(err, Err(ReaderError::DocumentLoad(_))));
    }

    #[test]
    fn blank_raster_is_white_and_nonzero() {
        let raster = RasterImage::blank(0, 0);
        assert_eq!((raster.width, raster.height), (1, 1));
        assert_eq!(raster.pixels, vec![0xff, 0xff, 0xff, 0xff]);
    }
}
