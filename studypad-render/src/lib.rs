//! Pdfium-backed document sessions: page rendering, viewport measurement,
//! and positioned text extraction over an in-memory PDF payload.

use std::mem;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use studypad_core::{
    document_id_for_bytes, DocumentInfo, DocumentMetadata, DocumentOpener, DocumentSession,
    RasterImage, ReaderError, RenderRequest, TextItem, Viewport,
};
use tracing::{instrument, warn};

/// Baseline jump treated as a line break while grouping characters.
const WORD_BASELINE_TOLERANCE: f32 = 6.0;

pub struct PdfiumOpener {
    pdfium: Arc<Pdfium>,
}

impl PdfiumOpener {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentOpener for PdfiumOpener {
    async fn open_bytes(&self, bytes: Vec<u8>) -> Result<Arc<dyn DocumentSession>, ReaderError> {
        let session = PdfiumSession::open(Arc::clone(&self.pdfium), bytes)?;
        Ok(Arc::new(session))
    }
}

pub struct PdfiumSession {
    info: DocumentInfo,
    cache: Mutex<Option<RenderCacheEntry>>,
    document: Mutex<Option<PdfDocument<'static>>>,
    bytes: Box<[u8]>,
    pdfium: Arc<Pdfium>,
}

struct RenderCacheEntry {
    page_index: usize,
    scale: f32,
    image: RasterImage,
}

impl PdfiumSession {
    fn open(pdfium: Arc<Pdfium>, bytes: Vec<u8>) -> Result<Self, ReaderError> {
        let id = document_id_for_bytes(&bytes);
        let info = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|err| ReaderError::DocumentLoad(err.to_string()))?;
            let metadata = document.metadata();
            DocumentInfo {
                id,
                page_count: document.pages().len() as usize,
                metadata: DocumentMetadata {
                    title: metadata
                        .get(PdfDocumentMetadataTagType::Title)
                        .map(|t| t.value().to_owned()),
                    author: metadata
                        .get(PdfDocumentMetadataTagType::Author)
                        .map(|t| t.value().to_owned()),
                },
            }
        };

        Ok(Self {
            info,
            cache: Mutex::new(None),
            document: Mutex::new(None),
            bytes: bytes.into_boxed_slice(),
            pdfium,
        })
    }

    fn open_document(&self) -> Result<PdfDocument<'static>, ReaderError> {
        // SAFETY: the borrow of self.bytes handed to pdfium must outlive the
        // cached PdfDocument. The payload lives on the heap in a Box<[u8]>
        // whose allocation is stable across moves of self, and struct fields
        // drop in declaration order, so self.document is dropped before both
        // self.bytes and self.pdfium.
        let slice = unsafe { mem::transmute::<&[u8], &'static [u8]>(self.bytes.as_ref()) };
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(slice, None)
            .map_err(|err| ReaderError::DocumentLoad(err.to_string()))?;
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        Ok(document)
    }

    fn with_document<R, F>(&self, f: F) -> Result<R, ReaderError>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R, ReaderError>,
    {
        let mut guard = self.document.lock();
        if guard.is_none() {
            *guard = Some(self.open_document()?);
        }
        match guard.as_ref() {
            Some(document) => f(document),
            None => Err(ReaderError::DocumentLoad("document not loaded".into())),
        }
    }

    fn page_index_for(&self, page_index: usize) -> Result<PdfPageIndex, ReaderError> {
        if page_index >= self.info.page_count {
            return Err(ReaderError::PageOutOfRange {
                page: page_index,
                page_count: self.info.page_count,
            });
        }
        page_index
            .try_into()
            .map_err(|_| ReaderError::PageOutOfRange {
                page: page_index,
                page_count: self.info.page_count,
            })
    }

    fn render_internal(
        &self,
        document: &PdfDocument<'_>,
        request: &RenderRequest,
    ) -> Result<RasterImage, ReaderError> {
        let page_index = self.page_index_for(request.page_index)?;
        let page = document
            .pages()
            .get(page_index)
            .map_err(|err| ReaderError::Render {
                page: request.page_index,
                reason: err.to_string(),
            })?;

        let config = PdfRenderConfig::new().scale_page_by_factor(request.scale.max(0.1));
        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| ReaderError::Render {
                page: request.page_index,
                reason: err.to_string(),
            })?;
        let image = bitmap.as_image().to_rgba8();
        let (width, height) = image.dimensions();

        Ok(RasterImage {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

impl DocumentSession for PdfiumSession {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn viewport(&self, page_index: usize, scale: f32) -> Result<Viewport, ReaderError> {
        let index = self.page_index_for(page_index)?;
        self.with_document(|document| {
            let page = document
                .pages()
                .get(index)
                .map_err(|err| ReaderError::Render {
                    page: page_index,
                    reason: err.to_string(),
                })?;
            Ok(Viewport::new(page.width().value, page.height().value).scaled(scale))
        })
    }

    #[instrument(skip(self))]
    fn render_page(&self, request: RenderRequest) -> Result<RasterImage, ReaderError> {
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.as_ref() {
                if entry.page_index == request.page_index
                    && (entry.scale - request.scale).abs() < f32::EPSILON
                {
                    return Ok(entry.image.clone());
                }
            }
        }

        let image = self.with_document(|document| self.render_internal(document, &request))?;

        let mut cache = self.cache.lock();
        *cache = Some(RenderCacheEntry {
            page_index: request.page_index,
            scale: request.scale,
            image: image.clone(),
        });

        Ok(image)
    }

    fn text_items(&self, page_index: usize) -> Result<Vec<TextItem>, ReaderError> {
        let index = self.page_index_for(page_index)?;
        self.with_document(|document| {
            let page = document
                .pages()
                .get(index)
                .map_err(|err| ReaderError::TextExtraction {
                    page: page_index,
                    reason: err.to_string(),
                })?;
            let text = page.text().map_err(|err| ReaderError::TextExtraction {
                page: page_index,
                reason: err.to_string(),
            })?;

            let mut words = WordAccumulator::new();
            for char_result in text.chars().iter() {
                let Some(c) = char_result.unicode_char() else {
                    continue;
                };
                let Ok(bounds) = char_result.loose_bounds() else {
                    continue;
                };
                words.push(
                    c,
                    bounds.left().value,
                    bounds.bottom().value,
                    bounds.right().value,
                );
            }
            Ok(words.finish())
        })
    }
}

/// Groups a character stream into word-level items. Whitespace ends the
/// current word; so does a baseline jump, which pdfium reports for line
/// wraps that carry no explicit whitespace character.
struct WordAccumulator {
    items: Vec<TextItem>,
    text: String,
    x: f32,
    y: f32,
    right: f32,
}

impl WordAccumulator {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            text: String::new(),
            x: 0.0,
            y: 0.0,
            right: 0.0,
        }
    }

    fn push(&mut self, c: char, left: f32, bottom: f32, right: f32) {
        if c.is_whitespace() {
            self.flush();
            return;
        }
        if !self.text.is_empty() && (bottom - self.y).abs() > WORD_BASELINE_TOLERANCE {
            self.flush();
        }
        if self.text.is_empty() {
            self.x = left;
            self.y = bottom;
        }
        self.text.push(c);
        self.right = self.right.max(right);
    }

    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.items.push(TextItem {
            text: mem::take(&mut self.text),
            x: self.x,
            y: self.y,
            width: (self.right - self.x).max(0.0),
        });
        self.right = 0.0;
    }

    fn finish(mut self) -> Vec<TextItem> {
        self.flush();
        self.items
    }
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("STUDYPAD_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(
                    "failed to load Pdfium from build-provided path {}: {}",
                    path, err
                );
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_splits_words() {
        let mut words = WordAccumulator::new();
        for (i, c) in "ab cd".chars().enumerate() {
            let left = i as f32 * 10.0;
            words.push(c, left, 100.0, left + 10.0);
        }
        let items = words.finish();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "ab");
        assert_eq!(items[0].x, 0.0);
        assert_eq!(items[0].width, 20.0);
        assert_eq!(items[1].text, "cd");
        assert_eq!(items[1].x, 30.0);
    }

    #[test]
    fn baseline_jump_splits_words() {
        let mut words = WordAccumulator::new();
        words.push('a', 0.0, 100.0, 10.0);
        words.push('b', 10.0, 100.0, 20.0);
        // Next line, no whitespace character in between.
        words.push('c', 0.0, 80.0, 10.0);
        let items = words.finish();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "ab");
        assert_eq!(items[1].text, "c");
        assert_eq!(items[1].y, 80.0);
    }

    #[test]
    fn trailing_word_is_flushed() {
        let mut words = WordAccumulator::new();
        words.push('x', 5.0, 50.0, 12.0);
        let items = words.finish();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "x");
        assert_eq!(items[0].width, 7.0);
    }

    #[test]
    fn whitespace_only_stream_yields_nothing() {
        let mut words = WordAccumulator::new();
        words.push(' ', 0.0, 0.0, 5.0);
        words.push('\n', 5.0, 0.0, 5.0);
        assert!(words.finish().is_empty());
    }
}
