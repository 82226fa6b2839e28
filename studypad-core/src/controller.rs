use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ReaderConfig;
use crate::document::{DocumentId, DocumentSession, Viewport};
use crate::stroke::{Annotation, Stroke, ToolSettings};
use crate::textflow::{compose_context, reconstruct_page_text};
use crate::timing::{Debouncer, IntervalTimer};

pub const FIT_SCALE_MIN: f32 = 0.4;
pub const FIT_SCALE_MAX: f32 = 4.0;
pub const ZOOM_SCALE_MIN: f32 = 0.5;
pub const ZOOM_SCALE_MAX: f32 = 4.0;

/// A page raster compressed for delivery to the tutoring collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    pub mime: &'static str,
    pub data_base64: String,
    pub width: u32,
    pub height: u32,
}

/// Receiving side of the live tutoring session. The wire protocol behind it
/// is not this crate's concern.
pub trait ContextSink: Send + Sync {
    fn push_text_context(&self, text: &str);
    fn push_image_frame(&self, frame: &EncodedFrame);
}

/// Supplies the current page's encoded raster on capture. Implemented over
/// whatever owns the page surfaces.
pub trait FrameSource {
    fn capture(&self, page_index: usize) -> Option<EncodedFrame>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    DocumentChanged(Option<DocumentId>),
    ScaleChanged(f32),
    CurrentPageChanged(usize),
    AnnotationChanged,
}

/// Orchestrates the page surfaces: owns the shared scale factor, the single
/// annotation slot, the current-page index, and the debounced context pushes
/// that run while a live session is connected. Surfaces never mutate this
/// state directly; they report events upward.
pub struct ReaderController {
    config: ReaderConfig,
    session: Option<Arc<dyn DocumentSession>>,
    scale: f32,
    annotation: Option<Annotation>,
    annotation_rev: u64,
    current_page: usize,
    tool: ToolSettings,
    live: bool,
    text_debounce: Debouncer,
    frame_debounce: Debouncer,
    frame_interval: IntervalTimer,
    last_context: Option<String>,
    events: Vec<ReaderEvent>,
}

impl ReaderController {
    pub fn new(config: ReaderConfig, now_ms: u64) -> Self {
        let text_debounce = Debouncer::new(config.text_debounce_ms);
        let frame_debounce = Debouncer::new(config.frame_debounce_ms);
        let frame_interval = IntervalTimer::new(config.frame_interval_ms, now_ms);
        Self {
            config,
            session: None,
            scale: 1.0,
            annotation: None,
            annotation_rev: 0,
            current_page: 0,
            tool: ToolSettings::default(),
            live: false,
            text_debounce,
            frame_debounce,
            frame_interval,
            last_context: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Arc<dyn DocumentSession>> {
        self.session.as_ref()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    /// Monotonic counter surfaces fold into their render signatures.
    pub fn annotation_rev(&self) -> u64 {
        self.annotation_rev
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn tool(&self) -> &ToolSettings {
        &self.tool
    }

    pub fn set_tool(&mut self, tool: ToolSettings) {
        self.tool = tool;
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces the open document. The previous session's resources are
    /// released when its last Arc drops; annotation and page position reset.
    pub fn open_document(&mut self, session: Arc<dyn DocumentSession>, now_ms: u64) {
        let id = session.info().id;
        self.session = Some(session);
        self.current_page = 0;
        self.scale = 1.0;
        self.clear_annotation();
        self.last_context = None;
        self.events.push(ReaderEvent::DocumentChanged(Some(id)));
        if self.live {
            self.text_debounce.trigger(now_ms);
        }
    }

    pub fn close_document(&mut self) {
        if self.session.take().is_some() {
            self.clear_annotation();
            self.last_context = None;
            self.text_debounce.reset();
            self.events.push(ReaderEvent::DocumentChanged(None));
        }
    }

    pub fn set_live(&mut self, live: bool, now_ms: u64) {
        self.live = live;
        if live {
            self.frame_interval.restart(now_ms);
            if self.session.is_some() {
                self.text_debounce.trigger(now_ms);
            }
        } else {
            self.text_debounce.reset();
            self.frame_debounce.reset();
        }
    }

    /// Scale filling the container width with the current page, minus the
    /// fixed padding, clamped to the fit range.
    pub fn fit_to_width(&mut self, container_width: f32) -> Option<f32> {
        let natural = self.natural_viewport()?;
        if natural.width <= 0.0 {
            return None;
        }
        let available = (container_width - self.config.fit_padding_px).max(0.0);
        Some(self.set_scale((available / natural.width).clamp(FIT_SCALE_MIN, FIT_SCALE_MAX)))
    }

    /// Scale fitting the whole page inside the container, minus padding on
    /// both axes.
    pub fn fit_to_page(&mut self, container_width: f32, container_height: f32) -> Option<f32> {
        let natural = self.natural_viewport()?;
        if natural.width <= 0.0 || natural.height <= 0.0 {
            return None;
        }
        let avail_w = (container_width - self.config.fit_padding_px).max(0.0);
        let avail_h = (container_height - self.config.fit_padding_px).max(0.0);
        let scale = (avail_w / natural.width).min(avail_h / natural.height);
        Some(self.set_scale(scale.clamp(FIT_SCALE_MIN, FIT_SCALE_MAX)))
    }

    pub fn zoom_by(&mut self, factor: f32) -> f32 {
        self.set_scale((self.scale * factor).clamp(ZOOM_SCALE_MIN, ZOOM_SCALE_MAX))
    }

    pub fn reset_scale(&mut self) -> f32 {
        self.set_scale(1.0)
    }

    fn set_scale(&mut self, scale: f32) -> f32 {
        if (self.scale - scale).abs() > f32::EPSILON {
            self.scale = scale;
            self.events.push(ReaderEvent::ScaleChanged(scale));
        }
        self.scale
    }

    fn natural_viewport(&self) -> Option<Viewport> {
        let session = self.session.as_ref()?;
        session.viewport(self.current_page, 1.0).ok()
    }

    /// A surface reported that it entered the visible window. The most
    /// recently activated page is the "current" page.
    pub fn page_activated(&mut self, page_index: usize, now_ms: u64) {
        if self.current_page != page_index {
            self.current_page = page_index;
            self.events.push(ReaderEvent::CurrentPageChanged(page_index));
        }
        if self.live && self.session.is_some() {
            self.text_debounce.trigger(now_ms);
        }
    }

    /// Clears the stored annotation before a new stroke begins. Single-slot:
    /// the whole application keeps at most one stored drawing.
    pub fn on_start_draw(&mut self) {
        self.clear_annotation();
    }

    pub fn on_finish_draw(&mut self, page_index: usize, stroke: Stroke, now_ms: u64) {
        self.annotation = Some(Annotation { page_index, stroke });
        self.annotation_rev += 1;
        self.events.push(ReaderEvent::AnnotationChanged);
        if self.live {
            self.frame_debounce.trigger(now_ms);
        }
    }

    pub fn clear_annotation(&mut self) {
        if self.annotation.take().is_some() {
            self.annotation_rev += 1;
            self.events.push(ReaderEvent::AnnotationChanged);
        }
    }

    /// Answers the collaborator's synchronous `getPageText` call from the
    /// last pushed context.
    pub fn last_text_context(&self) -> Option<&str> {
        self.last_context.as_deref()
    }

    /// Advances the schedule: fires due debouncers, runs the text-context
    /// extraction, and requests frame captures. Called from the UI loop and
    /// from tests with a virtual clock.
    pub fn tick(&mut self, now_ms: u64, sink: &dyn ContextSink, frames: &dyn FrameSource) {
        if self.live && self.frame_interval.fire(now_ms) {
            self.frame_debounce.trigger(now_ms);
        }

        if self.text_debounce.fire(now_ms) {
            self.push_text_context(sink);
        }

        if self.frame_debounce.fire(now_ms) {
            match frames.capture(self.current_page) {
                Some(frame) => sink.push_image_frame(&frame),
                None => debug!(page = self.current_page, "no raster available for frame capture"),
            }
        }
    }

    /// Extracts and reconstructs the current page and its neighbors. Any
    /// per-page failure skips this cycle; nothing is delivered and the
    /// reader keeps going.
    fn push_text_context(&mut self, sink: &dyn ContextSink) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let page_count = session.info().page_count;
        if page_count == 0 {
            return;
        }

        let first = self.current_page.saturating_sub(1);
        let last = (self.current_page + 1).min(page_count - 1);
        let mut pages = Vec::with_capacity(3);
        for page_index in first..=last {
            match session.text_items(page_index) {
                Ok(items) => pages.push((page_index, reconstruct_page_text(&items))),
                Err(err) => {
                    warn!(page = page_index, %err, "text extraction failed; skipping cycle");
                    return;
                }
            }
        }

        let context = compose_context(&pages);
        sink.push_text_context(&context);
        self.last_context = Some(context);
    }
}
