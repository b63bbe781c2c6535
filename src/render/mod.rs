//! Screen-side view of the annotations.
//!
//! [`Viewport`] maps between screen pixels and page-normalized ink;
//! [`RenderDispatcher`] turns document changes into dirty rectangles and
//! ordered draw lists for the host renderer.

pub mod dirty;
pub mod dispatch;
pub mod viewport;

pub use dirty::DirtyTracker;
pub use dispatch::{DrawItem, DrawSource, PageDrawList, RenderDispatcher, RenderFrame};
pub use viewport::{PageFrame, Viewport, ViewportTransform};
