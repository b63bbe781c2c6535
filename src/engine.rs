//! Input-to-ink pipeline.
//!
//! [`Engine`] owns the per-thread input state (normalizer, classifier, stroke
//! builder, render dispatcher) and a [`DocumentStore`] handle. Platform batches
//! flow through normalization and palm rejection into the stroke builder;
//! finished strokes are committed to the document through `apply`. The UI can
//! clone the store handle and mutate concurrently; every mutation is
//! serialized by the store.

use crate::config::Config;
use crate::document::{Command, DocumentError, DocumentStore, HistoryOutcome, InvalidCommand};
use crate::draw::{Color, Stroke, StrokeId, Tool};
use crate::ink::{BuildOutcome, PenSettings, StrokeBuilder};
use crate::input::{
    ContactClassifier, ContactId, ContactState, Normalizer, PlatformBatch, RawEvent,
};
use crate::render::{RenderDispatcher, RenderFrame, Viewport};
use log::{debug, warn};
use std::sync::Arc;

/// What happened to one batch of input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Normalized events fed to the classifier
    pub events: usize,
    /// Malformed or out-of-sequence events that were dropped
    pub dropped: usize,
    /// Events belonging to contacts classified as palm
    pub rejected: usize,
    pub committed: Vec<StrokeId>,
    /// In-progress strokes thrown away by a cancel
    pub discarded: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.events += other.events;
        self.dropped += other.dropped;
        self.rejected += other.rejected;
        self.committed.extend(other.committed);
        self.discarded += other.discarded;
    }
}

pub struct Engine {
    normalizer: Normalizer,
    classifier: ContactClassifier,
    builder: StrokeBuilder,
    store: DocumentStore,
    dispatcher: RenderDispatcher,
    viewport: Viewport,
    routed: Vec<RawEvent>,
}

impl Engine {
    pub fn new(config: &Config, viewport: Viewport) -> Self {
        Self::with_store(config, viewport, DocumentStore::new(&config.document))
    }

    /// Builds an engine around an existing (e.g. freshly loaded) document.
    pub fn with_store(config: &Config, viewport: Viewport, store: DocumentStore) -> Self {
        let mut config = config.clone();
        config.validate_and_clamp();
        Self {
            normalizer: Normalizer::new(),
            classifier: ContactClassifier::new(config.classifier.clone()),
            builder: StrokeBuilder::new(config.stroke.clone(), &config.tools),
            store,
            dispatcher: RenderDispatcher::new(),
            viewport,
            routed: Vec::new(),
        }
    }

    /// Shared handle to the document, for the UI and persistence layers.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Updates pan/zoom or the visible pages. Strokes in progress keep the
    /// page they started on.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Forces the next render to repaint the whole surface, e.g. after the
    /// host lost its backing buffer.
    pub fn invalidate(&mut self) {
        self.dispatcher.invalidate();
    }

    pub fn set_page_count(&self, page_count: Option<u32>) -> Result<(), InvalidCommand> {
        self.store.write(|doc| doc.set_page_count(page_count))
    }

    /// Runs one platform batch through the pipeline.
    pub fn handle_batch(&mut self, batch: &PlatformBatch) -> BatchReport {
        let normalized = self.normalizer.normalize(batch);
        if let Some(hovering) = normalized.hover {
            self.classifier.on_stylus_hover(hovering);
        }
        self.handle_events(&normalized.events)
    }

    /// Runs already normalized events through classification and stroke building.
    pub fn handle_events(&mut self, events: &[RawEvent]) -> BatchReport {
        let mut report = BatchReport::default();
        for event in events {
            report.events += 1;
            let mut routed = std::mem::take(&mut self.routed);
            match self.classifier.process(event, &mut routed) {
                Ok(ContactState::Palm) => report.rejected += 1,
                Ok(_) => {}
                Err(err) => {
                    debug!("Dropped {}: {}", event, err);
                    report.dropped += 1;
                }
            }
            report.merge(self.route(&mut routed));
            self.routed = routed;
        }
        report
    }

    /// Advances the classifier clock: resolves stale ambiguous contacts and
    /// expires contacts that went silent.
    pub fn tick(&mut self, now_ms: u64) -> BatchReport {
        let mut routed = std::mem::take(&mut self.routed);
        self.classifier.tick(now_ms, &mut routed);
        let report = self.route(&mut routed);
        self.routed = routed;
        report
    }

    fn route(&mut self, routed: &mut Vec<RawEvent>) -> BatchReport {
        let mut report = BatchReport::default();
        for event in routed.drain(..) {
            match self.builder.handle(&event, &self.viewport) {
                BuildOutcome::Finished(draft) => {
                    let id = self.store.next_stroke_id();
                    match self.store.apply(Command::AddStroke(draft.into_stroke(id))) {
                        Ok(()) => report.committed.push(id),
                        Err(err) => warn!("Could not commit stroke from contact {}: {}", event.contact_id, err),
                    }
                }
                BuildOutcome::Discarded { page_index } => {
                    debug!("Stroke on page {} cancelled", page_index);
                    report.discarded += 1;
                }
                BuildOutcome::Started { .. } | BuildOutcome::Extended | BuildOutcome::Ignored => {}
            }
        }
        report
    }

    /// Class of a tracked contact.
    pub fn classification(&self, contact: ContactId) -> Option<ContactState> {
        self.classifier.state_of(contact)
    }

    pub fn is_degraded(&self) -> bool {
        self.classifier.is_degraded()
    }

    /// Builds the next render frame: dirty rectangles plus draw lists for the
    /// visible pages, including strokes still being drawn.
    pub fn render(&mut self) -> RenderFrame {
        let live = self.builder.snapshot();
        self.dispatcher.prepare(&self.viewport, &self.store, &live)
    }

    /// Drops strokes in progress without touching the document.
    pub fn cancel_strokes(&mut self) -> usize {
        self.builder.cancel_all()
    }

    // ------------------------------------------------------------------------
    // UI surface
    // ------------------------------------------------------------------------

    pub fn apply(&self, command: Command) -> Result<(), DocumentError> {
        self.store.apply(command)
    }

    pub fn undo(&self) -> HistoryOutcome {
        self.store.undo()
    }

    pub fn redo(&self) -> HistoryOutcome {
        self.store.redo()
    }

    pub fn strokes_for_page(&self, page_index: u32) -> Vec<Arc<Stroke>> {
        self.store.strokes_for_page(page_index)
    }

    /// Erases every stroke passing within `radius_px` screen pixels of a
    /// screen position. Returns false when nothing was hit.
    pub fn erase_at(&self, sx: f64, sy: f64, radius_px: f64) -> Result<bool, DocumentError> {
        let Some(frame) = self.viewport.page_at(sx, sy).copied() else {
            return Ok(false);
        };
        let (u, v) = self.viewport.to_page(&frame, sx, sy);
        let page_width_px = self.viewport.scale_width(frame.width);
        if page_width_px <= 0.0 {
            return Ok(false);
        }
        let radius = radius_px.max(0.0) / page_width_px;
        let command = self
            .store
            .read(|doc| doc.erase_command(frame.page_index, u, v, radius));
        match command {
            Some(command) => self.store.apply(command).map(|()| true),
            None => Ok(false),
        }
    }

    /// Removes every stroke on a page as one undo step.
    pub fn clear_page(&self, page_index: u32) -> Result<bool, DocumentError> {
        match self.store.read(|doc| doc.clear_page_command(page_index)) {
            Some(command) => self.store.apply(command).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn pen(&self) -> &PenSettings {
        self.builder.pen()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.builder.set_tool(tool);
    }

    pub fn set_color(&mut self, color: Color) {
        self.builder.set_color(color);
    }

    pub fn set_base_width(&mut self, width: f64) {
        self.builder.set_base_width(width);
    }

    pub fn set_pressure_sensitivity(&mut self, enabled: bool) {
        self.builder.set_pressure_sensitivity(enabled);
    }

    pub fn set_shape_recognition(&mut self, enabled: bool) {
        self.builder.set_shape_recognition(enabled);
    }

    pub fn set_palm_rejection(&mut self, enabled: bool) {
        self.classifier.set_enabled(enabled);
    }

    pub fn palm_rejection(&self) -> bool {
        self.classifier.is_enabled()
    }

    pub fn set_sensitivity(&mut self, level: u8) {
        self.classifier.set_sensitivity(level);
    }

    pub fn sensitivity(&self) -> u8 {
        self.classifier.sensitivity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::RED;
    use crate::input::{ToolHint, TouchPhase};
    use crate::render::{PageFrame, ViewportTransform};

    fn pen(id: ContactId, phase: TouchPhase, x: f64, y: f64, t: u64) -> RawEvent {
        RawEvent {
            contact_id: id,
            x,
            y,
            pressure: Some(0.6),
            radius: Some(2.0),
            tool_hint: ToolHint::Stylus,
            timestamp_ms: t,
            phase,
        }
    }

    fn draw_line(engine: &mut Engine, id: ContactId, y: f64, t: u64) -> BatchReport {
        let events: Vec<RawEvent> = [
            (TouchPhase::Down, 100.0),
            (TouchPhase::Move, 150.0),
            (TouchPhase::Move, 200.0),
            (TouchPhase::Up, 250.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, (phase, x))| pen(id, *phase, *x, y, t + i as u64 * 8))
        .collect();
        engine.handle_events(&events)
    }

    fn engine() -> Engine {
        Engine::new(&Config::default(), Viewport::single_page(0, 500, 500))
    }

    #[test]
    fn pen_settings_apply_to_new_strokes() {
        let mut engine = engine();
        engine.set_tool(Tool::Marker);
        engine.set_color(RED);
        let report = draw_line(&mut engine, 1, 100.0, 0);
        assert_eq!(report.committed.len(), 1);
        let stroke = &engine.strokes_for_page(0)[0];
        assert_eq!(stroke.tool, Tool::Marker);
        assert_eq!(stroke.color, RED);
    }

    #[test]
    fn eraser_works_in_screen_space() {
        let mut engine = engine();
        draw_line(&mut engine, 1, 100.0, 0);
        draw_line(&mut engine, 2, 300.0, 100);
        assert!(!engine.erase_at(175.0, 200.0, 10.0).unwrap());
        assert!(engine.erase_at(175.0, 104.0, 10.0).unwrap());
        assert_eq!(engine.strokes_for_page(0).len(), 1);
        assert_eq!(engine.undo(), HistoryOutcome::Applied);
        assert_eq!(engine.strokes_for_page(0).len(), 2);
        assert!(engine.clear_page(0).unwrap());
        assert!(!engine.clear_page(0).unwrap());
    }

    #[test]
    fn render_follows_zoom_and_includes_live_ink() {
        let mut engine = Engine::new(
            &Config::default(),
            Viewport::new(
                ViewportTransform::default(),
                vec![PageFrame::new(0, 0.0, 0.0, 400.0, 400.0)],
                400,
                400,
            ),
        );
        draw_line(&mut engine, 1, 100.0, 0);
        engine.handle_events(&[pen(2, TouchPhase::Down, 50.0, 50.0, 100)]);
        engine.handle_events(&[pen(2, TouchPhase::Move, 60.0, 60.0, 108)]);

        let frame = engine.render();
        assert_eq!(frame.pages[0].items.len(), 2);

        let mut zoomed = engine.viewport().clone();
        zoomed.transform = ViewportTransform::new(2.0, 0.0, 0.0);
        engine.set_viewport(zoomed);
        let frame = engine.render();
        assert_eq!(frame.dirty.len(), 1);
        assert_eq!(frame.pages[0].items[0].points[0], (200.0, 200.0));

        assert_eq!(engine.cancel_strokes(), 1);
        assert_eq!(engine.render().pages[0].items.len(), 1);
    }

    #[test]
    fn invalidate_repaints_the_whole_surface() {
        let mut engine = engine();
        engine.render();
        assert!(engine.render().dirty.is_empty());
        engine.invalidate();
        assert_eq!(engine.render().dirty, vec![crate::util::Rect::new(0, 0, 500, 500).unwrap()]);
    }

    #[test]
    fn commit_failures_leave_document_unchanged() {
        let mut engine = engine();
        engine.set_page_count(Some(1)).unwrap();
        engine.set_viewport(Viewport::single_page(4, 500, 500));
        let report = draw_line(&mut engine, 1, 100.0, 0);
        assert!(report.committed.is_empty());
        assert!(engine.strokes_for_page(4).is_empty());
    }

    #[test]
    fn runtime_toggles_reach_the_classifier() {
        let mut engine = engine();
        engine.set_sensitivity(42);
        assert_eq!(engine.sensitivity(), 10);
        engine.set_palm_rejection(false);
        assert!(!engine.palm_rejection());
    }
}
