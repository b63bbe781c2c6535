//! Undo/redo log.
//!
//! The log keeps a baseline (the state at load time, or after old entries were
//! folded away) plus resolved changes. Replaying `entries[..cursor]` on top of
//! the baseline always reproduces the live page map.

use super::command::Change;
use crate::draw::{Stroke, StrokeId};
use log::error;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Live strokes per page, in z-order. Pages without strokes have no entry.
pub(crate) type PageMap = BTreeMap<u32, Vec<Arc<Stroke>>>;

/// Applies a resolved change. Recorded changes always match the state they are
/// replayed on; a mismatch means a bug and is logged rather than panicking.
pub(crate) fn apply_change(pages: &mut PageMap, change: &Change) {
    match change {
        Change::Added { stroke, index } => {
            let strokes = pages.entry(stroke.page_index).or_default();
            let index = (*index).min(strokes.len());
            strokes.insert(index, Arc::clone(stroke));
        }
        Change::Deleted { stroke, index } => {
            let page = stroke.page_index;
            let Some(strokes) = pages.get_mut(&page) else {
                error!("Stroke {} missing from page {} during replay", stroke.id, page);
                return;
            };
            let position = if strokes.get(*index).is_some_and(|s| s.id == stroke.id) {
                Some(*index)
            } else {
                strokes.iter().position(|s| s.id == stroke.id)
            };
            match position {
                Some(position) => {
                    strokes.remove(position);
                }
                None => error!("Stroke {} missing from page {} during replay", stroke.id, page),
            }
            if strokes.is_empty() {
                pages.remove(&page);
            }
        }
        Change::Restyled {
            before,
            after,
            index,
        } => {
            let slot = pages.get_mut(&before.page_index).and_then(|strokes| {
                if strokes.get(*index).is_some_and(|s| s.id == before.id) {
                    strokes.get_mut(*index)
                } else {
                    strokes.iter_mut().find(|s| s.id == before.id)
                }
            });
            match slot {
                Some(slot) => *slot = Arc::clone(after),
                None => error!("Stroke {} missing during restyle replay", before.id),
            }
        }
        Change::Batch(changes) => {
            for change in changes {
                apply_change(pages, change);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct History {
    baseline: PageMap,
    entries: VecDeque<Change>,
    cursor: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize, baseline: PageMap) -> Self {
        Self {
            baseline,
            entries: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Forgets all entries and starts over from `baseline`.
    pub fn reset(&mut self, baseline: PageMap) {
        self.baseline = baseline;
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Appends a change applied to the live state, discarding the redo tail.
    pub fn record(&mut self, change: Change) {
        self.entries.truncate(self.cursor);
        self.entries.push_back(change);
        self.cursor = self.entries.len();

        while self.entries.len() > self.limit {
            if let Some(oldest) = self.entries.pop_front() {
                apply_change(&mut self.baseline, &oldest);
                self.cursor -= 1;
            }
        }
    }

    /// Steps back; returns the change that reverts the entry.
    pub fn step_back(&mut self) -> Option<Change> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).map(Change::invert)
    }

    /// Steps forward; returns the entry to reapply.
    pub fn step_forward(&mut self) -> Option<Change> {
        let change = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(change)
    }

    /// True when an applied (not undone) entry refers to `id`.
    pub fn references(&self, id: StrokeId) -> bool {
        self.entries
            .iter()
            .take(self.cursor)
            .any(|change| change.references(id))
    }

    /// Baseline plus every applied entry.
    pub fn replay(&self) -> PageMap {
        let mut pages = self.baseline.clone();
        for change in self.entries.iter().take(self.cursor) {
            apply_change(&mut pages, change);
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{BLACK, Point, PressureCurve, Tool};

    fn stroke(id: u64, page: u32) -> Arc<Stroke> {
        Arc::new(Stroke {
            id: StrokeId(id),
            page_index: page,
            tool: Tool::Pencil,
            color: BLACK,
            base_width: 1.0,
            curve: PressureCurve::Constant,
            points: vec![Point::new(0.2, 0.2, 1.0, 0), Point::new(0.3, 0.3, 1.0, 5)],
        })
    }

    fn added(id: u64, index: usize) -> Change {
        Change::Added {
            stroke: stroke(id, 0),
            index,
        }
    }

    #[test]
    fn record_truncates_redo_tail() {
        let mut history = History::new(10, PageMap::new());
        history.record(added(1, 0));
        history.record(added(2, 1));
        assert!(history.step_back().is_some());
        history.record(added(3, 1));
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert!(!history.references(StrokeId(2)));
    }

    #[test]
    fn trimming_folds_into_baseline() {
        let mut history = History::new(2, PageMap::new());
        let mut live = PageMap::new();
        for (id, index) in [(1, 0), (2, 1), (3, 2)] {
            let change = added(id, index);
            apply_change(&mut live, &change);
            history.record(change);
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.replay(), live);
    }

    #[test]
    fn deleting_last_stroke_removes_page_entry() {
        let mut pages = PageMap::new();
        apply_change(&mut pages, &added(1, 0));
        apply_change(
            &mut pages,
            &Change::Deleted {
                stroke: stroke(1, 0),
                index: 0,
            },
        );
        assert!(pages.is_empty());
    }

    #[test]
    fn stepping_past_either_end_yields_nothing() {
        let mut history = History::new(4, PageMap::new());
        assert!(history.step_back().is_none());
        history.record(added(1, 0));
        assert!(history.step_forward().is_none());
        assert!(matches!(history.step_back(), Some(Change::Deleted { .. })));
        assert!(matches!(history.step_forward(), Some(Change::Added { .. })));
    }
}
