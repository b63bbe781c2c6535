//! Pressure-to-width curves.
//!
//! A curve turns a raw stylus pressure in `[0, 1]` into a multiplier applied to a
//! stroke's base width. Every variant is monotonic non-decreasing in its input
//! and never negative, which the constructors enforce and
//! [`PressureCurve::is_monotonic`] verifies for data coming back from disk.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Smallest exponent accepted for [`PressureCurve::Gamma`].
const MIN_GAMMA: f64 = 0.05;

/// Monotonic mapping from pressure to width multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PressureCurve {
    /// `min + p * (max - min)`
    Linear { min: f64, max: f64 },
    /// `min + p^exponent * (max - min)`; exponents above 1 need a firmer press
    Gamma { exponent: f64, min: f64, max: f64 },
    /// Piecewise-linear through `(pressure, multiplier)` control points
    Table { points: Vec<(f64, f64)> },
    /// Always 1.0 (fixed-width tools)
    Constant,
}

impl Default for PressureCurve {
    fn default() -> Self {
        PressureCurve::Linear { min: 0.5, max: 1.5 }
    }
}

impl PressureCurve {
    /// Builds a linear curve, swapping the bounds if they are reversed and
    /// raising negative ones to zero.
    pub fn linear(min: f64, max: f64) -> Self {
        PressureCurve::Linear {
            min: min.min(max).max(0.0),
            max: min.max(max).max(0.0),
        }
    }

    /// Builds a gamma curve with sane bounds and exponent.
    pub fn gamma(exponent: f64, min: f64, max: f64) -> Self {
        PressureCurve::Gamma {
            exponent: exponent.max(MIN_GAMMA),
            min: min.min(max).max(0.0),
            max: min.max(max).max(0.0),
        }
    }

    /// Builds a table curve: points are sorted by pressure and multipliers are
    /// raised to a running maximum so the result never decreases.
    pub fn table(mut points: Vec<(f64, f64)>) -> Self {
        points.retain(|(p, m)| p.is_finite() && m.is_finite());
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut floor = 0.0_f64;
        for point in &mut points {
            point.0 = point.0.clamp(0.0, 1.0);
            floor = floor.max(point.1);
            point.1 = floor;
        }
        if points.is_empty() {
            PressureCurve::Constant
        } else {
            PressureCurve::Table { points }
        }
    }

    /// Width multiplier for a pressure sample. Input is clamped to `[0, 1]`;
    /// NaN is treated as full pressure.
    pub fn multiplier(&self, pressure: f64) -> f64 {
        let p = if pressure.is_nan() {
            1.0
        } else {
            pressure.clamp(0.0, 1.0)
        };
        match self {
            PressureCurve::Linear { min, max } => min + p * (max - min),
            PressureCurve::Gamma { exponent, min, max } => {
                min + p.powf(exponent.max(MIN_GAMMA)) * (max - min)
            }
            PressureCurve::Table { points } => table_lookup(points, p),
            PressureCurve::Constant => 1.0,
        }
    }

    /// Largest multiplier the curve can produce.
    pub fn max_multiplier(&self) -> f64 {
        self.multiplier(1.0)
    }

    /// True when the stored parameters describe a non-decreasing curve that
    /// never drops below zero.
    pub fn is_monotonic(&self) -> bool {
        match self {
            PressureCurve::Linear { min, max } => {
                min.is_finite() && max.is_finite() && 0.0 <= *min && min <= max
            }
            PressureCurve::Gamma { exponent, min, max } => {
                exponent.is_finite()
                    && *exponent >= MIN_GAMMA
                    && min.is_finite()
                    && max.is_finite()
                    && 0.0 <= *min
                    && min <= max
            }
            PressureCurve::Table { points } => {
                !points.is_empty()
                    && points.iter().all(|(p, m)| {
                        p.is_finite() && m.is_finite() && (0.0..=1.0).contains(p) && *m >= 0.0
                    })
                    && points.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1)
            }
            PressureCurve::Constant => true,
        }
    }
}

fn table_lookup(points: &[(f64, f64)], p: f64) -> f64 {
    let Some(&(first_p, first_m)) = points.first() else {
        return 1.0;
    };
    if p <= first_p {
        return first_m;
    }
    for pair in points.windows(2) {
        let (p0, m0) = pair[0];
        let (p1, m1) = pair[1];
        if p <= p1 {
            if p1 <= p0 {
                return m1;
            }
            let t = (p - p0) / (p1 - p0);
            return m0 + t * (m1 - m0);
        }
    }
    points[points.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_default_spans_half_to_one_and_a_half() {
        let curve = PressureCurve::default();
        assert_eq!(curve.multiplier(0.0), 0.5);
        assert_eq!(curve.multiplier(1.0), 1.5);
        assert_eq!(curve.multiplier(2.0), 1.5);
        assert_eq!(curve.multiplier(f64::NAN), 1.5);
    }

    #[test]
    fn reversed_linear_bounds_are_swapped() {
        let curve = PressureCurve::linear(2.0, 1.0);
        assert!(curve.is_monotonic());
        assert!(curve.multiplier(0.2) <= curve.multiplier(0.8));
    }

    #[test]
    fn negative_multipliers_are_raised_to_zero() {
        let linear = PressureCurve::linear(-1.0, 2.0);
        assert_eq!(linear, PressureCurve::Linear { min: 0.0, max: 2.0 });
        assert_eq!(linear.multiplier(0.0), 0.0);

        let gamma = PressureCurve::gamma(2.0, -3.0, -1.0);
        assert!(gamma.is_monotonic());
        assert_eq!(gamma.max_multiplier(), 0.0);

        let table = PressureCurve::table(vec![(0.0, -0.5), (1.0, 1.0)]);
        assert_eq!(table.multiplier(0.0), 0.0);

        assert!(!PressureCurve::Linear { min: -0.5, max: 1.0 }.is_monotonic());
        assert!(!PressureCurve::Table { points: vec![(0.0, -1.0)] }.is_monotonic());
    }

    #[test]
    fn table_is_made_monotonic() {
        let curve = PressureCurve::table(vec![(1.0, 2.0), (0.0, 0.5), (0.5, 0.4)]);
        assert!(curve.is_monotonic());
        assert_eq!(curve.multiplier(0.0), 0.5);
        assert_eq!(curve.multiplier(0.5), 0.5);
        assert_eq!(curve.multiplier(0.75), 1.25);
        assert_eq!(curve.multiplier(1.0), 2.0);
    }

    #[test]
    fn empty_table_becomes_constant() {
        assert_eq!(PressureCurve::table(Vec::new()), PressureCurve::Constant);
    }

    #[test]
    fn hand_written_unsorted_table_is_flagged() {
        let curve = PressureCurve::Table {
            points: vec![(0.5, 1.0), (0.2, 2.0)],
        };
        assert!(!curve.is_monotonic());
    }
}
