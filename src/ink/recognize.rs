//! One-stroke shape recognition.
//!
//! A finished stroke whose outline is close enough to a line, circle, rectangle
//! or triangle is replaced by the clean shape. Inputs are in page layout units
//! so the heuristics see the page's true aspect ratio.

use crate::util::{Bounds, distance, point_line_distance};
use std::f64::consts::PI;

/// Segments used to approximate a recognized circle.
pub const CIRCLE_SEGMENTS: usize = 36;

/// Shorter lines and smaller rectangles are left as drawn.
const MIN_SHAPE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Circle,
    Rectangle,
    Triangle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedShape {
    pub kind: ShapeKind,
    /// Replacement outline; closed shapes repeat their first vertex at the end
    pub outline: Vec<(f64, f64)>,
}

/// Tries each shape in turn; `None` keeps the stroke as drawn.
pub fn recognize(points: &[(f64, f64)]) -> Option<RecognizedShape> {
    if points.len() < 3 {
        return None;
    }
    let bounds = Bounds::of_points(points.iter().copied())?;
    let first = points[0];
    let last = points[points.len() - 1];

    if is_line(points) {
        return Some(RecognizedShape {
            kind: ShapeKind::Line,
            outline: vec![first, last],
        });
    }

    let diagonal = bounds.width().hypot(bounds.height());
    if diagonal <= 0.0 || distance(first, last) / diagonal >= 0.15 {
        return None;
    }

    if is_circle(points, &bounds) {
        let center = (
            bounds.min_x + bounds.width() / 2.0,
            bounds.min_y + bounds.height() / 2.0,
        );
        let radius = (bounds.width() + bounds.height()) / 4.0;
        let outline = (0..=CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / CIRCLE_SEGMENTS as f64;
                (
                    center.0 + radius * angle.cos(),
                    center.1 + radius * angle.sin(),
                )
            })
            .collect();
        return Some(RecognizedShape {
            kind: ShapeKind::Circle,
            outline,
        });
    }

    if is_rectangle(points, &bounds) {
        let (x0, y0, x1, y1) = (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y);
        return Some(RecognizedShape {
            kind: ShapeKind::Rectangle,
            outline: vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)],
        });
    }

    if let Some([a, b, c]) = triangle_corners(points, &bounds) {
        return Some(RecognizedShape {
            kind: ShapeKind::Triangle,
            outline: vec![a, b, c, a],
        });
    }

    None
}

fn is_line(points: &[(f64, f64)]) -> bool {
    let start = points[0];
    let end = points[points.len() - 1];
    let length = distance(start, end);
    if length < MIN_SHAPE_SIZE {
        return false;
    }
    let max_deviation = points[1..points.len() - 1]
        .iter()
        .map(|p| point_line_distance(*p, start, end))
        .fold(0.0, f64::max);
    max_deviation / length < 0.1
}

fn is_circle(points: &[(f64, f64)], bounds: &Bounds) -> bool {
    let (width, height) = (bounds.width(), bounds.height());
    if width <= 0.0 || height <= 0.0 {
        return false;
    }
    let aspect = width / height;
    if aspect <= 0.7 || aspect >= 1.4 {
        return false;
    }
    let center = (bounds.min_x + width / 2.0, bounds.min_y + height / 2.0);
    let radius = (width + height) / 4.0;
    let mean_deviation = points
        .iter()
        .map(|p| (distance(*p, center) - radius).abs())
        .sum::<f64>()
        / points.len() as f64;
    mean_deviation / radius < 0.2
}

fn is_rectangle(points: &[(f64, f64)], bounds: &Bounds) -> bool {
    let (width, height) = (bounds.width(), bounds.height());
    if width < MIN_SHAPE_SIZE || height < MIN_SHAPE_SIZE {
        return false;
    }
    let tolerance = width.min(height) * 0.15;
    let on_edge = points
        .iter()
        .filter(|(x, y)| {
            (x - bounds.min_x).abs() < tolerance
                || (x - bounds.max_x).abs() < tolerance
                || (y - bounds.min_y).abs() < tolerance
                || (y - bounds.max_y).abs() < tolerance
        })
        .count();
    on_edge as f64 / points.len() as f64 > 0.7
}

/// The three sharpest turns, kept in stroke order, when they span a plausible
/// share of the bounding box.
fn triangle_corners(points: &[(f64, f64)], bounds: &Bounds) -> Option<[(f64, f64); 3]> {
    if points.len() < 10 {
        return None;
    }
    let mut turns: Vec<(usize, f64)> = (1..points.len() - 1)
        .map(|i| (i, turn_angle(points[i - 1], points[i], points[i + 1])))
        .collect();
    turns.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut corners: Vec<usize> = turns.iter().take(3).map(|(i, _)| *i).collect();
    if corners.len() != 3 {
        return None;
    }
    corners.sort_unstable();
    let [a, b, c] = [points[corners[0]], points[corners[1]], points[corners[2]]];

    let area = ((b.0 - a.0) * (c.1 - a.1) - (c.0 - a.0) * (b.1 - a.1)).abs() / 2.0;
    let bbox_area = bounds.width() * bounds.height();
    if bbox_area <= 0.0 {
        return None;
    }
    let ratio = area / bbox_area;
    (ratio > 0.3 && ratio < 0.7).then_some([a, b, c])
}

fn turn_angle(prev: (f64, f64), current: (f64, f64), next: (f64, f64)) -> f64 {
    let v1 = (current.0 - prev.0, current.1 - prev.1);
    let v2 = (next.0 - current.0, next.1 - current.1);
    let len1 = v1.0.hypot(v1.1);
    let len2 = v2.0.hypot(v2.1);
    if len1 == 0.0 || len2 == 0.0 {
        return 0.0;
    }
    ((v1.0 * v2.0 + v1.1 * v2.1) / (len1 * len2))
        .clamp(-1.0, 1.0)
        .acos()
}
