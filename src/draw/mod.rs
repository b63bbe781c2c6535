//! Ink data primitives.
//!
//! This module defines the core drawing types shared by the whole engine:
//! - [`Color`]: RGBA color representation with predefined color constants
//! - [`Tool`]: pen types and their pressure/opacity behaviour
//! - [`PressureCurve`]: monotonic pressure-to-width mapping
//! - [`Stroke`] and [`Point`]: committed ink in page-normalized coordinates

pub mod color;
pub mod pressure;
pub mod stroke;
pub mod tool;

// Re-export commonly used types at module level
pub use color::Color;
pub use pressure::PressureCurve;
pub use stroke::{Point, Stroke, StrokeId, StrokeStyle};
pub use tool::Tool;

pub use color::{BLACK, BLUE, GREEN, ORANGE, PINK, RED, WHITE, YELLOW};
