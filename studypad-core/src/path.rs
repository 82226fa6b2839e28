use crate::stroke::{NormPoint, RawPoint};

/// Drawable path produced from raw pointer samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(RawPoint),
    LineTo(RawPoint),
    QuadTo { ctrl: RawPoint, to: RawPoint },
}

/// Builds the smoothed stroke path: a straight segment to the first point,
/// then for each interior point a quadratic curve through it ending at the
/// midpoint with its successor, closing with a straight segment to the last
/// point. Raw pointer sampling otherwise shows visible polyline kinks.
pub fn midpoint_path(points: &[RawPoint]) -> Vec<PathSegment> {
    match points {
        [] => Vec::new(),
        [only] => vec![PathSegment::MoveTo(*only), PathSegment::LineTo(*only)],
        [first, .., last] => {
            let mut segments = Vec::with_capacity(points.len() + 1);
            segments.push(PathSegment::MoveTo(*first));
            for window in points.windows(2).skip(1) {
                let ctrl = window[0];
                segments.push(PathSegment::QuadTo {
                    ctrl,
                    to: ctrl.midpoint(window[1]),
                });
            }
            segments.push(PathSegment::LineTo(*last));
            segments
        }
    }
}

/// Scales normalized stroke points to a raster's pixel dimensions.
pub fn denormalize_points(points: &[NormPoint], width: f32, height: f32) -> Vec<RawPoint> {
    points
        .iter()
        .map(|p| p.denormalize(width, height))
        .collect()
}

const QUAD_FLATTEN_STEPS: usize = 16;

/// Flattens a path into a polyline for rasterization.
pub fn flatten_path(segments: &[PathSegment]) -> Vec<RawPoint> {
    let mut out = Vec::new();
    let mut cursor: Option<RawPoint> = None;

    for segment in segments {
        match *segment {
            PathSegment::MoveTo(p) => {
                out.push(p);
                cursor = Some(p);
            }
            PathSegment::LineTo(p) => {
                out.push(p);
                cursor = Some(p);
            }
            PathSegment::QuadTo { ctrl, to } => {
                let from = cursor.unwrap_or(ctrl);
                for step in 1..=QUAD_FLATTEN_STEPS {
                    let t = step as f32 / QUAD_FLATTEN_STEPS as f32;
                    out.push(quad_point(from, ctrl, to, t));
                }
                cursor = Some(to);
            }
        }
    }

    out
}

fn quad_point(from: RawPoint, ctrl: RawPoint, to: RawPoint, t: f32) -> RawPoint {
    let u = 1.0 - t;
    RawPoint::new(
        u * u * from.x + 2.0 * u * t * ctrl.x + t * t * to.x,
        u * u * from.y + 2.0 * u * t * ctrl.y + t * t * to.y,
    )
}
