//! Screen / page coordinate mapping.
//!
//! Pages are laid out by the document viewer in a shared layout space
//! ([`PageFrame`]); pan and zoom map layout space onto the screen
//! ([`ViewportTransform`]). Ink is stored page-normalized, so it survives both.

use crate::util::Rect;

/// Pan/zoom from layout space to screen pixels: `screen = layout * scale + pan`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewportTransform {
    pub fn new(scale: f64, pan_x: f64, pan_y: f64) -> Self {
        Self { scale, pan_x, pan_y }
    }

    pub fn is_valid(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0 && self.pan_x.is_finite() && self.pan_y.is_finite()
    }

    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.pan_x, y * self.scale + self.pan_y)
    }

    pub fn to_layout(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pan_x) / self.scale, (y - self.pan_y) / self.scale)
    }
}

/// Where one page sits in layout space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    pub page_index: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageFrame {
    pub fn new(page_index: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page_index,
            x,
            y,
            width,
            height,
        }
    }

    fn contains_layout(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Everything the viewer tells the engine about the current view.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub transform: ViewportTransform,
    /// Pages in view, in layout order
    pub pages: Vec<PageFrame>,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl Viewport {
    pub fn new(
        transform: ViewportTransform,
        pages: Vec<PageFrame>,
        surface_width: u32,
        surface_height: u32,
    ) -> Self {
        Self {
            transform,
            pages,
            surface_width,
            surface_height,
        }
    }

    /// A single page filling a `width x height` surface at 100% zoom.
    pub fn single_page(page_index: u32, width: u32, height: u32) -> Self {
        Self::new(
            ViewportTransform::default(),
            vec![PageFrame::new(
                page_index,
                0.0,
                0.0,
                f64::from(width),
                f64::from(height),
            )],
            width,
            height,
        )
    }

    pub fn frame(&self, page_index: u32) -> Option<&PageFrame> {
        self.pages.iter().find(|f| f.page_index == page_index)
    }

    /// Topmost page under a screen position.
    pub fn page_at(&self, sx: f64, sy: f64) -> Option<&PageFrame> {
        if !self.transform.is_valid() {
            return None;
        }
        let (lx, ly) = self.transform.to_layout(sx, sy);
        self.pages.iter().rev().find(|f| f.contains_layout(lx, ly))
    }

    /// Screen position to page-normalized coordinates, clamped to the page.
    pub fn to_page(&self, frame: &PageFrame, sx: f64, sy: f64) -> (f64, f64) {
        let (lx, ly) = self.transform.to_layout(sx, sy);
        let u = if frame.width > 0.0 {
            (lx - frame.x) / frame.width
        } else {
            0.0
        };
        let v = if frame.height > 0.0 {
            (ly - frame.y) / frame.height
        } else {
            0.0
        };
        (clamp_unit(u), clamp_unit(v))
    }

    /// Page-normalized coordinates to a screen position.
    pub fn to_screen(&self, frame: &PageFrame, u: f64, v: f64) -> (f64, f64) {
        self.transform
            .to_screen(frame.x + u * frame.width, frame.y + v * frame.height)
    }

    /// Document units (layout pixels) to screen pixels.
    pub fn scale_width(&self, width: f64) -> f64 {
        width * self.transform.scale
    }

    pub fn surface_rect(&self) -> Option<Rect> {
        Rect::new(
            0,
            0,
            i32::try_from(self.surface_width).unwrap_or(i32::MAX),
            i32::try_from(self.surface_height).unwrap_or(i32::MAX),
        )
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
