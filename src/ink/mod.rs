//! Stroke building.
//!
//! The [`StrokeBuilder`] consumes stylus-classified events per contact, maps
//! them onto the page under the pen, smooths positions and captures the pen
//! style. Finished strokes come out as [`StrokeDraft`]s awaiting a document id.

pub mod builder;
pub mod recognize;
pub mod smoothing;

pub use builder::{BuildOutcome, LiveStroke, PenSettings, StrokeBuilder, StrokeDraft};
pub use recognize::{RecognizedShape, ShapeKind};
pub use smoothing::Smoother;
