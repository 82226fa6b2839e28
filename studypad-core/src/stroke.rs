use serde::{Deserialize, Serialize};

/// A point in device pixels, relative to a page raster's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub x: f32,
    pub y: f32,
}

impl RawPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: RawPoint) -> RawPoint {
        RawPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A point normalized to [0,1]x[0,1] against the raster dimensions at
/// capture time, so strokes survive re-rendering at any scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl NormPoint {
    pub fn denormalize(self, width: f32, height: f32) -> RawPoint {
        RawPoint::new(self.x * width, self.y * height)
    }
}

/// One finished freehand gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<NormPoint>,
    pub color: String,
    pub width: f32,
}

/// The single stored drawing, bound to one page. The application keeps at
/// most one of these at a time; starting a new stroke discards it.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub page_index: usize,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    Pen,
    Highlighter,
    Pan,
}

impl Tool {
    /// Pan mode disables drawing entirely and leaves gestures to scrolling.
    pub fn draws(self) -> bool {
        !matches!(self, Tool::Pan)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: String,
    pub width: f32,
}

impl ToolSettings {
    pub fn pen() -> Self {
        Self {
            tool: Tool::Pen,
            color: "#1d4ed8".to_string(),
            width: 3.0,
        }
    }

    pub fn highlighter() -> Self {
        Self {
            tool: Tool::Highlighter,
            color: "#facc1566".to_string(),
            width: 14.0,
        }
    }

    pub fn pan() -> Self {
        Self {
            tool: Tool::Pan,
            color: String::new(),
            width: 0.0,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::pen()
    }
}

/// Accumulates raw pointer samples between pointer-down and pointer-up.
/// Callers gate `begin` on the active tool; the recorder itself only
/// tracks geometry.
#[derive(Debug, Default)]
pub struct StrokeRecorder {
    points: Vec<RawPoint>,
    active: bool,
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn raw_points(&self) -> &[RawPoint] {
        &self.points
    }

    pub fn begin(&mut self, point: RawPoint) {
        self.points.clear();
        self.points.push(point);
        self.active = true;
    }

    pub fn push(&mut self, point: RawPoint) {
        if self.active {
            self.points.push(point);
        }
    }

    /// Finishes the gesture, normalizing every sample by the raster's pixel
    /// dimensions. A tap with no movement still yields a single-point stroke
    /// (rendered as a dot).
    pub fn finish(
        &mut self,
        raster_width: u32,
        raster_height: u32,
        settings: &ToolSettings,
    ) -> Option<Stroke> {
        if !self.active {
            return None;
        }
        self.active = false;

        let width = raster_width.max(1) as f32;
        let height = raster_height.max(1) as f32;
        let points = self
            .points
            .drain(..)
            .map(|p| NormPoint {
                x: (p.x / width).clamp(0.0, 1.0),
                y: (p.y / height).clamp(0.0, 1.0),
            })
            .collect();

        Some(Stroke {
            points,
            color: settings.color.clone(),
            width: settings.width,
        })
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_stroke_points_are_normalized() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(RawPoint::new(0.0, 0.0));
        recorder.push(RawPoint::new(400.0, 300.0));
        recorder.push(RawPoint::new(800.0, 600.0));

        let stroke = recorder
            .finish(800, 600, &ToolSettings::pen())
            .expect("stroke expected");
        assert_eq!(stroke.points.len(), 3);
        for p in &stroke.points {
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
        }
        assert_eq!(stroke.points[1], NormPoint { x: 0.5, y: 0.5 });
    }

    #[test]
    fn tap_emits_single_point_stroke() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(RawPoint::new(100.0, 50.0));

        let stroke = recorder
            .finish(200, 100, &ToolSettings::pen())
            .expect("tap stroke expected");
        assert_eq!(stroke.points, vec![NormPoint { x: 0.5, y: 0.5 }]);
    }

    #[test]
    fn points_outside_raster_clamp_into_unit_square() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(RawPoint::new(-10.0, 650.0));
        let stroke = recorder
            .finish(800, 600, &ToolSettings::pen())
            .expect("stroke expected");
        assert_eq!(stroke.points[0], NormPoint { x: 0.0, y: 1.0 });
    }

    #[test]
    fn finish_without_begin_yields_nothing() {
        let mut recorder = StrokeRecorder::new();
        assert!(recorder.finish(800, 600, &ToolSettings::pen()).is_none());
    }

    #[test]
    fn cancel_discards_samples() {
        let mut recorder = StrokeRecorder::new();
        recorder.begin(RawPoint::new(1.0, 1.0));
        recorder.cancel();
        assert!(!recorder.is_active());
        assert!(recorder.finish(10, 10, &ToolSettings::pen()).is_none());
    }

    #[test]
    fn pan_tool_does_not_draw() {
        assert!(Tool::Pen.draws());
        assert!(Tool::Highlighter.draws());
        assert!(!Tool::Pan.draws());
    }
}
