//! Utility functions for colors and geometry.
//!
//! This module provides:
//! - Color name and hex parsing used by the configuration system
//! - Integer rectangles used for dirty region tracking
//! - Small floating-point geometry helpers shared by the classifier, ink and document code

use crate::draw::{Color, color::*};

// ============================================================================
// Color Mapping
// ============================================================================

/// Maps color name strings to Color values.
///
/// Used by the configuration system to parse color names from the config file.
///
/// # Supported Names (case-insensitive)
/// - "red", "green", "blue", "yellow", "orange", "pink", "white", "black"
pub fn name_to_color(name: &str) -> Option<Color> {
    match name.to_lowercase().as_str() {
        "red" => Some(RED),
        "green" => Some(GREEN),
        "blue" => Some(BLUE),
        "yellow" => Some(YELLOW),
        "orange" => Some(ORANGE),
        "pink" => Some(PINK),
        "white" => Some(WHITE),
        "black" => Some(BLACK),
        _ => None,
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` into a color.
pub fn hex_to_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if !digits.is_ascii() || (digits.len() != 6 && digits.len() != 8) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
    Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, alpha))
}

// ============================================================================
// Geometry Utilities
// ============================================================================

/// Axis-aligned rectangle helper used for dirty region tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle. Width/height must be positive.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            None
        } else {
            Some(Self {
                x,
                y,
                width,
                height,
            })
        }
    }

    /// Builds a rectangle from min/max bounds (inclusive min, exclusive max).
    pub fn from_min_max(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Option<Self> {
        Self::new(min_x, min_y, max_x.saturating_sub(min_x), max_y.saturating_sub(min_y))
    }

    /// Covers the floating-point box `[min, max]` with whole pixels.
    pub fn covering(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<Self> {
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        // Half the i32 range on each side keeps every width representable.
        let limit = f64::from(i32::MAX / 2);
        let pixel = |v: f64| v.clamp(-limit, limit) as i32;
        let x0 = pixel(min_x.floor());
        let y0 = pixel(min_y.floor());
        // A zero-area box still damages the pixel it sits on.
        let x1 = pixel(max_x.ceil()).max(x0 + 1);
        let y1 = pixel(max_y.ceil()).max(y0 + 1);
        Self::from_min_max(x0, y0, x1, y1)
    }

    /// Clamps the rectangle to `[0, width) x [0, height)`, returning `None` when nothing is left.
    pub fn clamp_to_bounds(self, width: i32, height: i32) -> Option<Rect> {
        let max_x = self.x.saturating_add(self.width).clamp(0, width);
        let max_y = self.y.saturating_add(self.height).clamp(0, height);
        let x = self.x.clamp(0, width);
        let y = self.y.clamp(0, height);
        Rect::from_min_max(x, y, max_x, max_y)
    }

    /// Returns true if rectangle has a positive area.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Floating-point bounds in whatever space the caller works in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Bounds of a point cloud, `None` when empty.
    pub fn of_points(mut points: impl Iterator<Item = (f64, f64)>) -> Option<Self> {
        let (x, y) = points.next()?;
        let mut bounds = Bounds {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        };
        for (x, y) in points {
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Expands the bounds evenly in all directions by `amount`.
    pub fn inflate(self, amount: f64) -> Self {
        Bounds {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }
}

/// Euclidean distance between two points.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Perpendicular distance from `point` to the infinite line through `start` and `end`.
///
/// Falls back to the distance to `start` when the line is degenerate.
pub fn point_line_distance(point: (f64, f64), start: (f64, f64), end: (f64, f64)) -> f64 {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return distance(point, start);
    }
    ((point.0 - start.0) * dy - (point.1 - start.1) * dx).abs() / length
}
