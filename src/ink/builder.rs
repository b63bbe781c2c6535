//! Turns stylus-classified events into strokes.

use super::recognize::{self, ShapeKind};
use super::smoothing::Smoother;
use crate::config::{StrokeConfig, ToolWidths, ToolsConfig};
use crate::draw::{Color, Point, PressureCurve, Stroke, StrokeId, Tool};
use crate::input::{ContactId, RawEvent, TouchPhase};
use crate::render::{PageFrame, Viewport};
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

/// Active pen selection applied to strokes as they start.
#[derive(Debug, Clone, PartialEq)]
pub struct PenSettings {
    pub tool: Tool,
    pub color: Color,
    pub base_width: f64,
}

/// A finished or in-progress stroke that has no document id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeDraft {
    pub page_index: u32,
    pub tool: Tool,
    pub color: Color,
    pub base_width: f64,
    pub curve: PressureCurve,
    pub points: Vec<Point>,
}

impl StrokeDraft {
    pub fn into_stroke(self, id: StrokeId) -> Stroke {
        Stroke {
            id,
            page_index: self.page_index,
            tool: self.tool,
            color: self.color,
            base_width: self.base_width,
            curve: self.curve,
            points: self.points,
        }
    }

    /// Width at point `index` under this draft's curve.
    pub fn width_at(&self, index: usize) -> f64 {
        let pressure = self.points.get(index).map_or(1.0, |p| p.pressure);
        self.base_width * self.curve.multiplier(pressure)
    }

    pub fn max_width(&self) -> f64 {
        self.base_width * self.curve.max_multiplier().max(1.0)
    }
}

/// Read-only copy of a stroke being drawn, for the render path.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStroke {
    pub contact_id: ContactId,
    pub draft: StrokeDraft,
    /// True when the last point is extrapolated rather than sampled
    pub predicted: bool,
}

/// Result of feeding one event to the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Started { page_index: u32 },
    Extended,
    Finished(StrokeDraft),
    /// The in-progress stroke was thrown away (platform cancel)
    Discarded { page_index: u32 },
    /// Nothing changed (duplicate sample, off-page contact, unknown contact)
    Ignored,
}

#[derive(Debug, Clone)]
struct InProgress {
    /// Where the stroke's page sat on screen at the latest sample
    frame: PageFrame,
    draft: StrokeDraft,
    smoother: Smoother,
    last_page: (f64, f64),
}

/// Per-contact stroke accumulation with smoothing and pressure mapping.
#[derive(Debug)]
pub struct StrokeBuilder {
    config: StrokeConfig,
    widths: ToolWidths,
    pen: PenSettings,
    active: BTreeMap<ContactId, InProgress>,
    off_page: BTreeSet<ContactId>,
}

impl StrokeBuilder {
    pub fn new(config: StrokeConfig, tools: &ToolsConfig) -> Self {
        let tool = tools.default_tool;
        let pen = PenSettings {
            tool,
            color: tools.default_color.to_color(),
            base_width: tools.default_tool_widths.width_for(tool),
        };
        Self {
            config,
            widths: tools.default_tool_widths.clone(),
            pen,
            active: BTreeMap::new(),
            off_page: BTreeSet::new(),
        }
    }

    pub fn pen(&self) -> &PenSettings {
        &self.pen
    }

    /// Switches tool; the width resets to that tool's configured default.
    pub fn set_tool(&mut self, tool: Tool) {
        self.pen.tool = tool;
        self.pen.base_width = self.widths.width_for(tool);
    }

    pub fn set_color(&mut self, color: Color) {
        self.pen.color = color;
    }

    pub fn set_base_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.pen.base_width = width;
        }
    }

    pub fn set_pressure_sensitivity(&mut self, enabled: bool) {
        self.config.pressure_sensitivity = enabled;
    }

    pub fn set_shape_recognition(&mut self, enabled: bool) {
        self.config.shape_recognition = enabled;
    }

    /// Number of strokes currently being drawn.
    pub fn in_progress(&self) -> usize {
        self.active.len()
    }

    pub fn handle(&mut self, event: &RawEvent, viewport: &Viewport) -> BuildOutcome {
        match event.phase {
            TouchPhase::Down => self.begin(event, viewport),
            TouchPhase::Move => self.extend(event, viewport),
            TouchPhase::Up => self.finish(event, viewport),
            TouchPhase::Cancel => self.discard(event.contact_id),
        }
    }

    /// Drops every in-progress stroke, e.g. when the document is closed.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        self.off_page.clear();
        count
    }

    /// Copies of the strokes being drawn. Prediction, when enabled, extends
    /// the tail linearly; it never reaches the committed stroke.
    pub fn snapshot(&self) -> Vec<LiveStroke> {
        self.active
            .iter()
            .map(|(contact_id, progress)| {
                let mut draft = progress.draft.clone();
                let predicted = match self.predict(&draft.points) {
                    Some(point) => {
                        draft.points.push(point);
                        true
                    }
                    None => false,
                };
                LiveStroke {
                    contact_id: *contact_id,
                    draft,
                    predicted,
                }
            })
            .collect()
    }

    fn begin(&mut self, event: &RawEvent, viewport: &Viewport) -> BuildOutcome {
        let id = event.contact_id;
        if self.active.remove(&id).is_some() {
            debug!("Contact {} restarted before finishing; dropping its stroke", id);
        }
        self.off_page.remove(&id);

        let Some(frame) = viewport.page_at(event.x, event.y).copied() else {
            trace!("Contact {} started outside every page", id);
            self.off_page.insert(id);
            return BuildOutcome::Ignored;
        };

        let pen = &self.pen;
        let curve = if self.config.pressure_sensitivity && pen.tool.pressure_mapped() {
            self.config.pressure_curve.clone()
        } else {
            PressureCurve::Constant
        };
        let color = pen.color.with_alpha(pen.color.a * pen.tool.opacity());

        let mut smoother = Smoother::new(self.config.smoothing_window_size);
        let page_pos = viewport.to_page(&frame, event.x, event.y);
        let (x, y) = smoother.push(page_pos);

        let draft = StrokeDraft {
            page_index: frame.page_index,
            tool: pen.tool,
            color,
            base_width: pen.base_width,
            curve,
            points: vec![Point::new(x, y, pressure_of(event), event.timestamp_ms)],
        };
        self.active.insert(
            id,
            InProgress {
                frame,
                draft,
                smoother,
                last_page: page_pos,
            },
        );
        BuildOutcome::Started {
            page_index: frame.page_index,
        }
    }

    fn extend(&mut self, event: &RawEvent, viewport: &Viewport) -> BuildOutcome {
        let Some(progress) = self.active.get_mut(&event.contact_id) else {
            return BuildOutcome::Ignored;
        };
        if progress.append(event, viewport) {
            BuildOutcome::Extended
        } else {
            BuildOutcome::Ignored
        }
    }

    fn finish(&mut self, event: &RawEvent, viewport: &Viewport) -> BuildOutcome {
        let id = event.contact_id;
        self.off_page.remove(&id);
        let Some(mut progress) = self.active.remove(&id) else {
            return BuildOutcome::Ignored;
        };
        progress.append(event, viewport);

        // Pin the end to where the pen actually lifted.
        let (raw_x, raw_y) = progress.last_page;
        if let Some(last) = progress.draft.points.last_mut() {
            last.x = raw_x;
            last.y = raw_y;
        }

        let mut draft = progress.draft;
        if draft.points.len() == 1 {
            let mut dot = draft.points[0];
            dot.timestamp_ms = dot.timestamp_ms.max(event.timestamp_ms);
            draft.points.push(dot);
            draft.base_width = draft.base_width.max(self.config.min_dot_width);
        } else if self.config.shape_recognition {
            snap_to_shape(&mut draft, &progress.frame);
        }

        debug!(
            "Contact {} finished a {} stroke with {} points on page {}",
            id,
            draft.tool,
            draft.points.len(),
            draft.page_index
        );
        BuildOutcome::Finished(draft)
    }

    fn discard(&mut self, id: ContactId) -> BuildOutcome {
        self.off_page.remove(&id);
        match self.active.remove(&id) {
            Some(progress) => {
                debug!("Contact {} cancelled; discarding its stroke", id);
                BuildOutcome::Discarded {
                    page_index: progress.draft.page_index,
                }
            }
            None => BuildOutcome::Ignored,
        }
    }

    fn predict(&self, points: &[Point]) -> Option<Point> {
        if self.config.prediction_ms == 0 || points.len() < 2 {
            return None;
        }
        let last = points[points.len() - 1];
        let prev = points[points.len() - 2];
        let dt = last.timestamp_ms.checked_sub(prev.timestamp_ms)?;
        if dt == 0 {
            return None;
        }
        let ahead = self.config.prediction_ms as f64 / dt as f64;
        Some(Point::new(
            (last.x + (last.x - prev.x) * ahead).clamp(0.0, 1.0),
            (last.y + (last.y - prev.y) * ahead).clamp(0.0, 1.0),
            last.pressure,
            last.timestamp_ms + self.config.prediction_ms,
        ))
    }
}

impl InProgress {
    /// Adds a sample unless the pen has not moved on its page. Returns whether
    /// a point was added.
    ///
    /// The page is looked up again on every sample so panning or zooming mid-stroke
    /// keeps ink under the pen. A page scrolled out of the viewport keeps its
    /// last known placement.
    fn append(&mut self, event: &RawEvent, viewport: &Viewport) -> bool {
        if !event.x.is_finite() || !event.y.is_finite() {
            return false;
        }
        if let Some(frame) = viewport.frame(self.draft.page_index) {
            self.frame = *frame;
        }
        let page_pos = viewport.to_page(&self.frame, event.x, event.y);
        if page_pos == self.last_page {
            return false;
        }
        self.last_page = page_pos;
        let (x, y) = self.smoother.push(page_pos);
        let timestamp_ms = self
            .draft
            .points
            .last()
            .map_or(event.timestamp_ms, |p| p.timestamp_ms.max(event.timestamp_ms));
        self.draft
            .points
            .push(Point::new(x, y, pressure_of(event), timestamp_ms));
        true
    }
}

fn pressure_of(event: &RawEvent) -> f64 {
    event
        .pressure
        .filter(|p| p.is_finite())
        .map_or(1.0, |p| p.clamp(0.0, 1.0))
}

/// Replaces the draft's points with a recognized shape outline, if any.
fn snap_to_shape(draft: &mut StrokeDraft, frame: &PageFrame) {
    if frame.width <= 0.0 || frame.height <= 0.0 {
        return;
    }
    let layout: Vec<(f64, f64)> = draft
        .points
        .iter()
        .map(|p| (p.x * frame.width, p.y * frame.height))
        .collect();
    let Some(shape) = recognize::recognize(&layout) else {
        return;
    };

    let count = draft.points.len() as f64;
    let pressure = draft.points.iter().map(|p| p.pressure).sum::<f64>() / count;
    let start = draft.points.first().map_or(0, |p| p.timestamp_ms);
    let end = draft.points.last().map_or(start, |p| p.timestamp_ms);
    let segments = shape.outline.len().saturating_sub(1).max(1) as u64;

    draft.points = shape
        .outline
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            let timestamp_ms = start + (end - start) * i as u64 / segments;
            Point::new(
                (x / frame.width).clamp(0.0, 1.0),
                (y / frame.height).clamp(0.0, 1.0),
                pressure,
                timestamp_ms,
            )
        })
        .collect();
    debug!(
        "Recognized {} on page {}",
        match shape.kind {
            ShapeKind::Line => "line",
            ShapeKind::Circle => "circle",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Triangle => "triangle",
        },
        draft.page_index
    );
}
