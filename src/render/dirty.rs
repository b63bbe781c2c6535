//! Dirty region tracking for incremental rendering.
//!
//! Collects screen-space rectangles that need repainting between frames.

use crate::util::{Bounds, Rect};

/// Tracks dirty rectangles accumulated between renders.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    regions: Vec<Rect>,
    force_full: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the entire surface as dirty. Clears any accumulated rectangles.
    pub fn mark_full(&mut self) {
        self.force_full = true;
        self.regions.clear();
    }

    pub fn is_full(&self) -> bool {
        self.force_full
    }

    /// Adds a dirty rectangle if the tracker is not already full.
    pub fn mark_rect(&mut self, rect: Rect) {
        if !rect.is_valid() || self.force_full {
            return;
        }
        if self.regions.contains(&rect) {
            return;
        }
        self.regions.push(rect);
    }

    pub fn mark_optional_rect(&mut self, rect: Option<Rect>) {
        if let Some(rect) = rect {
            self.mark_rect(rect);
        }
    }

    /// Adds screen-space float bounds, rounded outwards to whole pixels.
    pub fn mark_bounds(&mut self, bounds: Bounds) {
        self.mark_optional_rect(Rect::covering(
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y,
        ));
    }

    /// Drains the dirty regions gathered so far, clipped to the surface.
    ///
    /// When the full surface is marked, returns a single rectangle covering the
    /// entire surface; otherwise returns accumulated rectangles.
    pub fn take_regions(&mut self, width: i32, height: i32) -> Vec<Rect> {
        if self.force_full {
            self.force_full = false;
            self.regions.clear();
            return Rect::new(0, 0, width, height).into_iter().collect();
        }
        self.regions
            .drain(..)
            .filter_map(|rect| rect.clamp_to_bounds(width, height))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_rounded_outwards() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_bounds(Bounds {
            min_x: 1.5,
            min_y: 2.5,
            max_x: 10.2,
            max_y: 4.0,
        });
        assert_eq!(
            tracker.take_regions(100, 100),
            vec![Rect::new(1, 2, 10, 2).unwrap()]
        );
        assert!(tracker.take_regions(100, 100).is_empty());
    }

    #[test]
    fn mark_full_takes_precedence() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_rect(Rect::new(5, 5, 10, 10).unwrap());
        tracker.mark_full();
        tracker.mark_rect(Rect::new(20, 20, 15, 15).unwrap());

        let rects = tracker.take_regions(200, 100);
        assert_eq!(rects, vec![Rect::new(0, 0, 200, 100).unwrap()]);
        assert!(!tracker.is_full());
    }

    #[test]
    fn regions_off_the_surface_are_dropped() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_rect(Rect::new(-20, -20, 10, 10).unwrap());
        tracker.mark_rect(Rect::new(90, 90, 20, 20).unwrap());
        assert_eq!(
            tracker.take_regions(100, 100),
            vec![Rect::new(90, 90, 10, 10).unwrap()]
        );
    }
}
