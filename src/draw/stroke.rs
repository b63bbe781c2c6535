//! Ink stroke definitions.
//!
//! Points are stored in page-normalized coordinates (`0.0..=1.0` on both axes,
//! independent of zoom). A stroke is immutable once committed to a document; a
//! style change produces a new stroke value with the same id.

use super::color::Color;
use super::pressure::PressureCurve;
use super::tool::Tool;
use crate::util::Bounds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document-wide stroke identifier, allocated monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(pub u64);

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One ink sample in page-normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Raw stylus pressure in `[0, 1]`
    pub pressure: f64,
    /// Monotonic timestamp of the originating event in milliseconds
    pub timestamp_ms: u64,
}

impl Point {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            pressure,
            timestamp_ms,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
            && (0.0..=1.0).contains(&self.pressure)
    }
}

/// Mutable appearance of a committed stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    /// Base width in document units (screen pixels at 100% zoom)
    pub base_width: f64,
}

impl StrokeStyle {
    pub fn is_valid(&self) -> bool {
        self.color.is_valid() && self.base_width.is_finite() && self.base_width > 0.0
    }
}

/// A finished ink mark on a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub page_index: u32,
    pub tool: Tool,
    pub color: Color,
    pub base_width: f64,
    /// Curve captured when the stroke was drawn so later config edits don't reflow old ink
    pub curve: PressureCurve,
    pub points: Vec<Point>,
}

impl Stroke {
    /// Current style of the stroke.
    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color,
            base_width: self.base_width,
        }
    }

    /// Returns a copy of this stroke with a different style.
    pub fn with_style(&self, style: StrokeStyle) -> Stroke {
        Stroke {
            color: style.color,
            base_width: style.base_width,
            ..self.clone()
        }
    }

    /// Rendered width at point `index` in document units.
    pub fn width_at(&self, index: usize) -> f64 {
        let pressure = self.points.get(index).map_or(1.0, |p| p.pressure);
        self.base_width * self.curve.multiplier(pressure)
    }

    /// Widest the stroke can render, used to pad damage regions.
    pub fn max_width(&self) -> f64 {
        self.base_width * self.curve.max_multiplier().max(1.0)
    }

    /// Bounds of the centre line in page-normalized space.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_points(self.points.iter().map(Point::position))
    }

    /// Structural checks applied before a stroke enters a document.
    pub fn validate(&self) -> Result<(), String> {
        if self.points.len() < 2 {
            return Err(format!(
                "stroke {} has {} point(s); at least 2 are required",
                self.id,
                self.points.len()
            ));
        }
        if !self.style().is_valid() {
            return Err(format!("stroke {} has an invalid style", self.id));
        }
        if !self.curve.is_monotonic() {
            return Err(format!("stroke {} has a non-monotonic pressure curve", self.id));
        }
        if let Some(index) = self.points.iter().position(|p| !p.is_valid()) {
            return Err(format!(
                "stroke {} point {} lies outside the page or has invalid pressure",
                self.id, index
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::RED;

    fn sample() -> Stroke {
        Stroke {
            id: StrokeId(1),
            page_index: 0,
            tool: Tool::Ballpoint,
            color: RED,
            base_width: 2.0,
            curve: PressureCurve::default(),
            points: vec![Point::new(0.1, 0.2, 0.0, 0), Point::new(0.3, 0.4, 1.0, 8)],
        }
    }

    #[test]
    fn width_follows_pressure_curve() {
        let stroke = sample();
        assert_eq!(stroke.width_at(0), 1.0);
        assert_eq!(stroke.width_at(1), 3.0);
        assert_eq!(stroke.max_width(), 3.0);
    }

    #[test]
    fn validate_rejects_single_point_and_out_of_page() {
        let mut stroke = sample();
        assert!(stroke.validate().is_ok());
        stroke.points[1].x = 1.5;
        assert!(stroke.validate().is_err());
        stroke.points.truncate(1);
        assert!(stroke.validate().is_err());
    }

    #[test]
    fn with_style_keeps_geometry() {
        let stroke = sample();
        let restyled = stroke.with_style(StrokeStyle {
            color: crate::draw::BLUE,
            base_width: 4.0,
        });
        assert_eq!(restyled.points, stroke.points);
        assert_eq!(restyled.id, stroke.id);
        assert_eq!(restyled.base_width, 4.0);
    }
}
