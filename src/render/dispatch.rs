//! Per-frame draw lists and damage.
//!
//! The dispatcher never draws. Each frame it turns document damage, the live
//! strokes and the viewport into screen-space dirty rectangles plus an ordered
//! draw list per visible page, which the host renderer consumes.

use super::dirty::DirtyTracker;
use super::viewport::{PageFrame, Viewport};
use crate::document::DocumentStore;
use crate::draw::{Color, Point, Stroke, Tool};
use crate::ink::LiveStroke;
use crate::input::ContactId;
use crate::util::{Bounds, Rect};
use log::trace;
use std::sync::Arc;

/// Extra pixels around stroke bounds for antialiasing.
const AA_MARGIN: f64 = 1.0;

/// Where a draw item came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawSource {
    Committed(Arc<Stroke>),
    /// Stroke still being drawn by a contact
    Live(ContactId),
}

/// One stroke ready to paint, already in screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub source: DrawSource,
    pub tool: Tool,
    pub points: Vec<(f64, f64)>,
    /// Screen-space width at each point
    pub widths: Vec<f64>,
    pub color: Color,
}

impl DrawItem {
    pub fn max_width(&self) -> f64 {
        self.widths.iter().copied().fold(0.0, f64::max)
    }
}

/// Draw items for one page, bottom to top.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDrawList {
    pub page_index: u32,
    pub items: Vec<DrawItem>,
}

/// Output of one dispatcher pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub dirty: Vec<Rect>,
    pub pages: Vec<PageDrawList>,
}

impl RenderFrame {
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct RenderDispatcher {
    tracker: DirtyTracker,
    last_viewport: Option<Viewport>,
    live_regions: Vec<Bounds>,
}

impl RenderDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next frame to repaint everything.
    pub fn invalidate(&mut self) {
        self.tracker.mark_full();
    }

    /// Builds the next frame.
    pub fn prepare(
        &mut self,
        viewport: &Viewport,
        store: &DocumentStore,
        live: &[LiveStroke],
    ) -> RenderFrame {
        if self.last_viewport.as_ref() != Some(viewport) {
            trace!("Viewport changed; repainting the whole surface");
            self.tracker.mark_full();
            self.last_viewport = Some(viewport.clone());
        }

        // Damage is drained every frame, even when a full repaint makes it moot.
        let damage = store.take_damage();
        if !self.tracker.is_full() {
            for stroke in damage {
                let Some(frame) = viewport.frame(stroke.page_index) else {
                    continue;
                };
                if let Some(bounds) = damage_bounds(viewport, frame, &stroke.points, stroke.max_width()) {
                    self.tracker.mark_bounds(bounds);
                }
            }
        }

        // Live strokes repaint where they were and where they are now.
        for bounds in self.live_regions.drain(..) {
            self.tracker.mark_bounds(bounds);
        }
        for live_stroke in live {
            let draft = &live_stroke.draft;
            let Some(frame) = viewport.frame(draft.page_index) else {
                continue;
            };
            if let Some(bounds) = damage_bounds(viewport, frame, &draft.points, draft.max_width()) {
                self.tracker.mark_bounds(bounds);
                self.live_regions.push(bounds);
            }
        }

        let (width, height) = viewport
            .surface_rect()
            .map_or((0, 0), |surface| (surface.width, surface.height));
        let dirty = self.tracker.take_regions(width, height);

        let pages = viewport
            .pages
            .iter()
            .map(|frame| {
                let mut items: Vec<DrawItem> = store
                    .strokes_for_page(frame.page_index)
                    .into_iter()
                    .map(|stroke| committed_item(viewport, frame, stroke))
                    .collect();
                items.extend(
                    live.iter()
                        .filter(|l| l.draft.page_index == frame.page_index)
                        .map(|l| live_item(viewport, frame, l)),
                );
                PageDrawList {
                    page_index: frame.page_index,
                    items,
                }
            })
            .collect();

        RenderFrame { dirty, pages }
    }
}

fn screen_points(viewport: &Viewport, frame: &PageFrame, points: &[Point]) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|p| viewport.to_screen(frame, p.x, p.y))
        .collect()
}

/// Screen-space box a stroke paints into, padded by half its width.
fn damage_bounds(
    viewport: &Viewport,
    frame: &PageFrame,
    points: &[Point],
    max_width: f64,
) -> Option<Bounds> {
    let bounds = Bounds::of_points(points.iter().map(|p| viewport.to_screen(frame, p.x, p.y)))?;
    Some(bounds.inflate(viewport.scale_width(max_width) / 2.0 + AA_MARGIN))
}

fn committed_item(viewport: &Viewport, frame: &PageFrame, stroke: Arc<Stroke>) -> DrawItem {
    let widths = (0..stroke.points.len())
        .map(|i| viewport.scale_width(stroke.width_at(i)))
        .collect();
    DrawItem {
        points: screen_points(viewport, frame, &stroke.points),
        tool: stroke.tool,
        color: stroke.color,
        widths,
        source: DrawSource::Committed(stroke),
    }
}

fn live_item(viewport: &Viewport, frame: &PageFrame, live: &LiveStroke) -> DrawItem {
    let draft = &live.draft;
    DrawItem {
        source: DrawSource::Live(live.contact_id),
        tool: draft.tool,
        points: screen_points(viewport, frame, &draft.points),
        widths: (0..draft.points.len())
            .map(|i| viewport.scale_width(draft.width_at(i)))
            .collect(),
        color: draft.color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Command;
    use crate::draw::{BLACK, PressureCurve, RED, StrokeStyle};
    use crate::ink::StrokeDraft;
    use crate::render::ViewportTransform;

    fn add(store: &DocumentStore, page: u32, from: (f64, f64), to: (f64, f64)) -> crate::draw::StrokeId {
        let id = store.next_stroke_id();
        store
            .apply(Command::AddStroke(Stroke {
                id,
                page_index: page,
                tool: Tool::Marker,
                color: BLACK,
                base_width: 4.0,
                curve: PressureCurve::Constant,
                points: vec![Point::new(from.0, from.1, 0.5, 0), Point::new(to.0, to.1, 0.5, 8)],
            }))
            .unwrap();
        id
    }

    fn viewport() -> Viewport {
        Viewport::new(
            ViewportTransform::default(),
            vec![
                PageFrame::new(0, 0.0, 0.0, 100.0, 100.0),
                PageFrame::new(1, 0.0, 110.0, 100.0, 100.0),
            ],
            200,
            400,
        )
    }

    #[test]
    fn first_frame_and_viewport_changes_repaint_everything() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let view = viewport();

        let frame = dispatcher.prepare(&view, &store, &[]);
        assert_eq!(frame.dirty, vec![Rect::new(0, 0, 200, 400).unwrap()]);
        assert!(dispatcher.prepare(&view, &store, &[]).dirty.is_empty());

        let mut zoomed = view.clone();
        zoomed.transform.scale = 2.0;
        let frame = dispatcher.prepare(&zoomed, &store, &[]);
        assert_eq!(frame.dirty, vec![Rect::new(0, 0, 200, 400).unwrap()]);
    }

    #[test]
    fn new_stroke_damages_its_padded_bounds() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let view = viewport();
        dispatcher.prepare(&view, &store, &[]);

        add(&store, 0, (0.2, 0.2), (0.4, 0.2));
        let frame = dispatcher.prepare(&view, &store, &[]);
        // 20..40 x 20..20 widened by half of 4px plus one pixel of margin
        assert_eq!(frame.dirty, vec![Rect::new(17, 17, 26, 6).unwrap()]);
    }

    #[test]
    fn invalidate_swallows_pending_damage() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let view = viewport();
        dispatcher.prepare(&view, &store, &[]);

        add(&store, 0, (0.2, 0.2), (0.4, 0.2));
        dispatcher.invalidate();
        let frame = dispatcher.prepare(&view, &store, &[]);
        assert_eq!(frame.dirty, vec![Rect::new(0, 0, 200, 400).unwrap()]);
        assert!(dispatcher.prepare(&view, &store, &[]).dirty.is_empty());
    }

    #[test]
    fn empty_surface_reports_no_damage() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let mut view = viewport();
        view.surface_width = 0;
        add(&store, 0, (0.2, 0.2), (0.4, 0.2));
        let frame = dispatcher.prepare(&view, &store, &[]);
        assert!(frame.dirty.is_empty());
        assert_eq!(frame.pages[0].items.len(), 1);
    }

    #[test]
    fn draw_order_follows_insertion_and_skips_hidden_pages() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let first = add(&store, 1, (0.1, 0.1), (0.2, 0.2));
        let second = add(&store, 1, (0.1, 0.1), (0.2, 0.2));
        add(&store, 7, (0.1, 0.1), (0.2, 0.2));
        store
            .apply(Command::ChangeStrokeStyle {
                stroke_id: first,
                style: StrokeStyle {
                    color: RED,
                    base_width: 1.0,
                },
            })
            .unwrap();

        let frame = dispatcher.prepare(&viewport(), &store, &[]);
        assert_eq!(frame.pages.len(), 2);
        assert!(frame.pages[0].items.is_empty());
        let ids: Vec<_> = frame.pages[1]
            .items
            .iter()
            .map(|item| match &item.source {
                DrawSource::Committed(stroke) => stroke.id,
                DrawSource::Live(_) => panic!("no live strokes"),
            })
            .collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(frame.pages[1].items[0].color, RED);
        assert_eq!(frame.pages[1].items[0].points[0], (10.0, 120.0));
        assert_eq!(frame.item_count(), 2);
    }

    #[test]
    fn live_strokes_draw_on_top_and_clear_their_old_area() {
        let store = DocumentStore::default();
        let mut dispatcher = RenderDispatcher::new();
        let view = viewport();
        add(&store, 0, (0.5, 0.5), (0.6, 0.6));
        dispatcher.prepare(&view, &store, &[]);

        let live = LiveStroke {
            contact_id: 9,
            draft: StrokeDraft {
                page_index: 0,
                tool: Tool::Ballpoint,
                color: BLACK,
                base_width: 2.0,
                curve: PressureCurve::Constant,
                points: vec![Point::new(0.1, 0.1, 1.0, 0), Point::new(0.2, 0.1, 1.0, 8)],
            },
            predicted: false,
        };
        let frame = dispatcher.prepare(&view, &store, std::slice::from_ref(&live));
        assert_eq!(frame.dirty.len(), 1);
        assert_eq!(frame.pages[0].items.len(), 2);
        assert_eq!(frame.pages[0].items[1].source, DrawSource::Live(9));

        // Once the live stroke is gone its last area is still repainted.
        let frame = dispatcher.prepare(&view, &store, &[]);
        assert_eq!(frame.dirty.len(), 1);
        assert!(dispatcher.prepare(&view, &store, &[]).dirty.is_empty());
    }
}
