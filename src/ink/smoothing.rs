//! Positional smoothing for live strokes.

use std::collections::VecDeque;

/// Linearly weighted moving average over the last `window` positions.
///
/// The newest sample carries weight `window`, the oldest weight 1, which keeps
/// the smoothed tip close to the pen while still ironing out digitizer jitter.
/// A window of 1 passes positions through untouched.
#[derive(Debug, Clone)]
pub struct Smoother {
    window: usize,
    recent: VecDeque<(f64, f64)>,
}

impl Smoother {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    /// Adds a raw position and returns the smoothed one.
    pub fn push(&mut self, position: (f64, f64)) -> (f64, f64) {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(position);

        let mut weight_sum = 0.0;
        let mut x = 0.0;
        let mut y = 0.0;
        for (i, (px, py)) in self.recent.iter().enumerate() {
            let weight = (i + 1) as f64;
            weight_sum += weight;
            x += px * weight;
            y += py * weight;
        }
        (x / weight_sum, y / weight_sum)
    }
}
