//! One visible page: raster ownership, lazy activation, generation-tagged
//! render tracking, and the annotation/stroke overlay compositor.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use png::{BitDepth, ColorType, Encoder};
use studypad_core::{
    activation::intersects_with_lookahead, midpoint_path, path::denormalize_points,
    path::flatten_path, Activation, ActivationTracker, Annotation, EncodedFrame, PageBounds,
    RasterImage, RawPoint, ReaderConfig, ReaderError, RenderRequest, ScrollWindow, Stroke,
    StrokeRecorder, ToolSettings,
};
use tracing::debug;

/// Inputs whose change forces a fresh page render. One render is issued per
/// distinct signature, never one per scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderSignature {
    scale_milli: u32,
    annotation_rev: u64,
    stroke_rev: u64,
}

fn quantize_scale(scale: f32) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Tags an issued render so results landing after a newer request started
/// are dropped instead of writing stale pixels.
#[derive(Debug, Clone, Copy)]
pub struct RenderTicket {
    generation: u64,
}

pub struct PageSurface {
    page_index: usize,
    tracker: ActivationTracker,
    raster: Option<RasterImage>,
    generation: u64,
    issued: Option<RenderSignature>,
    recorder: StrokeRecorder,
    stroke_rev: u64,
}

impl PageSurface {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            tracker: ActivationTracker::new(),
            raster: None,
            generation: 0,
            issued: None,
            recorder: StrokeRecorder::new(),
            stroke_rev: 0,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_active()
    }

    pub fn raster(&self) -> Option<&RasterImage> {
        self.raster.as_ref()
    }

    pub fn has_stroke_in_progress(&self) -> bool {
        self.recorder.is_active()
    }

    /// Applies a fresh intersection observation. Deactivation releases the
    /// raster (a placeholder shows instead) and invalidates anything still
    /// in flight.
    pub fn observe_visibility(
        &mut self,
        bounds: PageBounds,
        window: ScrollWindow,
        config: &ReaderConfig,
    ) -> Option<Activation> {
        let visible = intersects_with_lookahead(
            bounds,
            window,
            config.lookahead_margin_px,
            config.min_visible_fraction,
        );
        let change = self.tracker.observe(visible);
        if change == Some(Activation::Inactive) {
            self.raster = None;
            self.issued = None;
            self.generation += 1;
            self.recorder.cancel();
        }
        change
    }

    fn signature(&self, scale: f32, annotation_rev: u64) -> RenderSignature {
        RenderSignature {
            scale_milli: quantize_scale(scale),
            annotation_rev,
            stroke_rev: self.stroke_rev,
        }
    }

    pub fn wants_render(&self, scale: f32, annotation_rev: u64) -> bool {
        self.tracker.is_active() && self.issued != Some(self.signature(scale, annotation_rev))
    }

    /// Starts a render for the current input signature, superseding any
    /// in-flight one. Returns nothing while the page is inactive or the
    /// signature is unchanged.
    pub fn begin_render(
        &mut self,
        scale: f32,
        annotation_rev: u64,
    ) -> Option<(RenderTicket, RenderRequest)> {
        if !self.wants_render(scale, annotation_rev) {
            return None;
        }
        self.generation += 1;
        self.issued = Some(self.signature(scale, annotation_rev));
        Some((
            RenderTicket {
                generation: self.generation,
            },
            RenderRequest {
                page_index: self.page_index,
                scale,
            },
        ))
    }

    /// Lands a finished render: composites the stored annotation (when it
    /// belongs to this page) and any in-progress stroke over the page
    /// content, then swaps the raster in. Results from a superseded ticket
    /// are dropped.
    pub fn commit_render(
        &mut self,
        ticket: RenderTicket,
        mut image: RasterImage,
        annotation: Option<&Annotation>,
        tool: &ToolSettings,
    ) -> Result<(), ReaderError> {
        if ticket.generation != self.generation || !self.tracker.is_active() {
            debug!(
                page = self.page_index,
                ticket = ticket.generation,
                current = self.generation,
                "dropping superseded render result"
            );
            return Err(ReaderError::RenderSuperseded);
        }

        if let Some(annotation) = annotation.filter(|a| a.page_index == self.page_index) {
            draw_stored_stroke(&mut image, &annotation.stroke);
        }
        if self.recorder.is_active() {
            draw_raw_points(&mut image, self.recorder.raw_points(), &tool.color, tool.width);
        }

        self.raster = Some(image);
        Ok(())
    }

    /// Begins capture when the active tool draws. Returns true when a stroke
    /// started, in which case the caller must clear the stored annotation
    /// through the controller before the new stroke can be stored.
    pub fn pointer_down(&mut self, point: RawPoint, tool: &ToolSettings) -> bool {
        if !tool.tool.draws() || !self.tracker.is_active() {
            return false;
        }
        self.recorder.begin(point);
        self.stroke_rev += 1;
        true
    }

    pub fn pointer_move(&mut self, point: RawPoint) {
        if self.recorder.is_active() {
            self.recorder.push(point);
            self.stroke_rev += 1;
        }
    }

    /// Ends capture, normalizing against the raster's current dimensions.
    pub fn pointer_up(&mut self, tool: &ToolSettings) -> Option<Stroke> {
        if !self.recorder.is_active() {
            return None;
        }
        self.stroke_rev += 1;
        let Some(raster) = self.raster.as_ref() else {
            self.recorder.cancel();
            return None;
        };
        self.recorder.finish(raster.width, raster.height, tool)
    }

    /// Encodes the current raster for delivery to the tutoring collaborator.
    pub fn encode_frame(&self) -> Option<Result<EncodedFrame, ReaderError>> {
        self.raster.as_ref().map(encode_frame)
    }
}

fn draw_stored_stroke(image: &mut RasterImage, stroke: &Stroke) {
    let points = denormalize_points(&stroke.points, image.width as f32, image.height as f32);
    draw_raw_points(image, &points, &stroke.color, stroke.width);
}

fn draw_raw_points(image: &mut RasterImage, points: &[RawPoint], color: &str, width: f32) {
    let Some(color) = parse_color(color) else {
        return;
    };
    let flat = flatten_path(&midpoint_path(points));
    let radius = (width / 2.0).max(0.5);

    let mut previous: Option<RawPoint> = None;
    for point in flat {
        if let Some(prev) = previous {
            let dx = point.x - prev.x;
            let dy = point.y - prev.y;
            let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
            for step in 1..=steps {
                let t = step as f32 / steps as f32;
                stamp_disc(image, prev.x + dx * t, prev.y + dy * t, radius, color);
            }
        } else {
            stamp_disc(image, point.x, point.y, radius, color);
        }
        previous = Some(point);
    }
}

/// Alpha-blends a filled disc, giving the stroke its round caps and joins.
fn stamp_disc(image: &mut RasterImage, cx: f32, cy: f32, radius: f32, color: [u8; 4]) {
    let min_x = ((cx - radius).floor().max(0.0)) as u32;
    let min_y = ((cy - radius).floor().max(0.0)) as u32;
    let max_x = ((cx + radius).ceil() as i64).clamp(0, image.width as i64) as u32;
    let max_y = ((cy + radius).ceil() as i64).clamp(0, image.height as i64) as u32;
    let alpha = color[3] as f32 / 255.0;

    for y in min_y..max_y {
        for x in min_x..max_x {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let offset = ((y * image.width + x) * 4) as usize;
            for channel in 0..3 {
                let base = image.pixels[offset + channel] as f32;
                let ink = color[channel] as f32;
                image.pixels[offset + channel] = (base + (ink - base) * alpha) as u8;
            }
            image.pixels[offset + 3] = 255;
        }
    }
}

/// Parses `#rrggbb` or `#rrggbbaa`.
pub fn parse_color(raw: &str) -> Option<[u8; 4]> {
    let hex = raw.strip_prefix('#')?;
    match hex.len() {
        6 | 8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            let a = if hex.len() == 8 {
                u8::from_str_radix(&hex[6..8], 16).ok()?
            } else {
                255
            };
            Some([r, g, b, a])
        }
        _ => None,
    }
}

pub fn encode_png(image: &RasterImage) -> Result<Bytes, ReaderError> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|err| ReaderError::FrameEncode(format!("png header: {err}")))?;
    writer
        .write_image_data(&image.pixels)
        .map_err(|err| ReaderError::FrameEncode(format!("png payload: {err}")))?;
    writer
        .finish()
        .map_err(|err| ReaderError::FrameEncode(format!("png finish: {err}")))?;
    Ok(Bytes::from(buffer))
}

pub fn encode_frame(image: &RasterImage) -> Result<EncodedFrame, ReaderError> {
    let encoded = encode_png(image)?;
    Ok(EncodedFrame {
        mime: "image/png",
        data_base64: BASE64.encode(&encoded),
        width: image.width,
        height: image.height,
    })
}

/// Vertical placement of every page in the continuous scroll column.
pub struct PageLayout {
    heights: Vec<f32>,
    spacing: f32,
}

impl PageLayout {
    pub fn new(heights: Vec<f32>, spacing: f32) -> Self {
        Self { heights, spacing }
    }

    pub fn bounds(&self, page_index: usize) -> Option<PageBounds> {
        let height = *self.heights.get(page_index)?;
        let top: f32 = self.heights[..page_index]
            .iter()
            .map(|h| h + self.spacing)
            .sum();
        Some(PageBounds::new(top, height))
    }

    pub fn total_height(&self) -> f32 {
        let spacing = self.spacing * self.heights.len().saturating_sub(1) as f32;
        self.heights.iter().sum::<f32>() + spacing
    }
}
