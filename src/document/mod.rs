//! Annotation document model.
//!
//! Strokes live per page in insertion (z) order. Every mutation goes through
//! [`AnnotationDocument::apply`], which validates the [`Command`], applies it and
//! records the resolved change for undo/redo. Readers get `Arc<Stroke>` values,
//! which are immutable, so a stroke handed out is never modified in place.

pub mod codec;
pub mod command;
mod history;
pub mod store;


pub use codec::{CodecError, DocumentSnapshot, FORMAT_VERSION};
pub use command::Command;
pub use store::DocumentStore;

use self::command::Change;
use self::history::{History, PageMap, apply_change};
use crate::config::DocumentConfig;
use crate::draw::{Stroke, StrokeId};
use crate::util::distance;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Why a command was refused. The document is unchanged when this is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCommand {
    #[error("stroke {0} does not exist")]
    UnknownStroke(StrokeId),

    #[error("stroke id {0} is already in use")]
    DuplicateStroke(StrokeId),

    #[error("page {page} is outside the {page_count} page document")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("page {page} already holds {limit} strokes")]
    PageFull { page: u32, limit: usize },

    #[error("{0}")]
    MalformedStroke(String),

    #[error("new style for stroke {0} is invalid")]
    InvalidStyle(StrokeId),

    #[error("batch contains no commands")]
    EmptyBatch,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] InvalidCommand),

    #[error("annotation persistence failed: {0}")]
    Persistence(#[from] CodecError),
}

/// Result of an undo or redo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Applied,
    /// Nothing left to undo/redo; the document is unchanged
    AtBoundary,
}

#[derive(Debug, Clone)]
pub struct AnnotationDocument {
    pages: PageMap,
    page_count: Option<u32>,
    next_id: u64,
    revision: u64,
    history: History,
    max_strokes_per_page: usize,
    damage: Vec<Arc<Stroke>>,
}

impl Default for AnnotationDocument {
    fn default() -> Self {
        Self::new(&DocumentConfig::default())
    }
}

impl AnnotationDocument {
    pub fn new(config: &DocumentConfig) -> Self {
        Self {
            pages: PageMap::new(),
            page_count: None,
            next_id: 1,
            revision: 0,
            history: History::new(config.max_history, PageMap::new()),
            max_strokes_per_page: config.max_strokes_per_page.max(1),
            damage: Vec::new(),
        }
    }

    /// Builds a document from a serialized payload.
    pub fn deserialize(bytes: &[u8], config: &DocumentConfig) -> Result<Self, DocumentError> {
        let snapshot = codec::decode(bytes)?;
        let mut document = Self::new(config);
        document.restore(snapshot);
        Ok(document)
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    /// Declares how many pages the underlying file has. Fails if strokes
    /// already exist beyond the new count.
    pub fn set_page_count(&mut self, page_count: Option<u32>) -> Result<(), InvalidCommand> {
        if let Some(count) = page_count {
            if let Some(page) = self.pages.keys().copied().find(|page| *page >= count) {
                return Err(InvalidCommand::PageOutOfRange {
                    page,
                    page_count: count,
                });
            }
        }
        self.page_count = page_count;
        Ok(())
    }

    /// Allocates a fresh stroke id.
    pub fn next_stroke_id(&mut self) -> StrokeId {
        let id = StrokeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Incremented on every change to the live stroke set.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn apply(&mut self, command: Command) -> Result<(), DocumentError> {
        let kind = command.kind();
        let change = self.execute(command).inspect_err(|err| {
            debug!("Refused {} command: {}", kind, err);
        })?;
        change.touched(&mut self.damage);
        self.history.record(change);
        self.revision += 1;
        debug!("Applied {} (revision {})", kind, self.revision);
        Ok(())
    }

    pub fn undo(&mut self) -> HistoryOutcome {
        match self.history.step_back() {
            Some(change) => {
                self.commit_replayed(&change);
                HistoryOutcome::Applied
            }
            None => {
                debug!("Nothing to undo");
                HistoryOutcome::AtBoundary
            }
        }
    }

    pub fn redo(&mut self) -> HistoryOutcome {
        match self.history.step_forward() {
            Some(change) => {
                self.commit_replayed(&change);
                HistoryOutcome::Applied
            }
            None => {
                debug!("Nothing to redo");
                HistoryOutcome::AtBoundary
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Live strokes on a page in draw order.
    pub fn strokes_for_page(&self, page_index: u32) -> Vec<Arc<Stroke>> {
        self.pages.get(&page_index).cloned().unwrap_or_default()
    }

    pub fn stroke(&self, id: StrokeId) -> Option<Arc<Stroke>> {
        self.locate(id)
            .and_then(|(page, index)| self.pages.get(&page)?.get(index).cloned())
    }

    /// Pages that currently hold strokes, ascending.
    pub fn annotated_pages(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    pub fn stroke_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Copy of the persistent state; strokes are shared, not cloned.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            page_count: self.page_count,
            next_stroke_id: self.next_id,
            pages: self.pages.clone(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(codec::encode(&self.snapshot())?)
    }

    /// Replaces the live state with a payload. On error the document is untouched.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), DocumentError> {
        let snapshot = codec::decode(bytes)?;
        self.restore(snapshot);
        Ok(())
    }

    /// Replaces the live state with an already decoded snapshot and clears history.
    pub fn restore(&mut self, snapshot: DocumentSnapshot) {
        for strokes in self.pages.values() {
            self.damage.extend(strokes.iter().cloned());
        }
        for strokes in snapshot.pages.values() {
            self.damage.extend(strokes.iter().cloned());
        }
        let floor = snapshot
            .pages
            .values()
            .flatten()
            .map(|s| s.id.0 + 1)
            .max()
            .unwrap_or(1);
        self.pages = snapshot.pages;
        self.pages.retain(|_, strokes| !strokes.is_empty());
        self.page_count = snapshot.page_count;
        self.next_id = snapshot.next_stroke_id.max(floor);
        self.history.reset(self.pages.clone());
        self.revision += 1;
        info!(
            "Loaded {} strokes on {} pages",
            self.stroke_count(),
            self.pages.len()
        );
    }

    /// Strokes whose appearance changed since the last call (added, removed
    /// or restyled, both old and new versions).
    pub fn take_damage(&mut self) -> Vec<Arc<Stroke>> {
        std::mem::take(&mut self.damage)
    }

    /// Builds one undoable command deleting every stroke on `page_index` that
    /// passes within `radius` (page-normalized units) of `(x, y)`.
    pub fn erase_command(&self, page_index: u32, x: f64, y: f64, radius: f64) -> Option<Command> {
        let strokes = self.pages.get(&page_index)?;
        let hits: Vec<Command> = strokes
            .iter()
            .filter(|stroke| stroke_touches_circle(stroke, (x, y), radius))
            .map(|stroke| Command::DeleteStroke {
                stroke_id: stroke.id,
            })
            .collect();
        (!hits.is_empty()).then_some(Command::Batch(hits))
    }

    /// Builds one undoable command deleting everything on a page.
    pub fn clear_page_command(&self, page_index: u32) -> Option<Command> {
        let strokes = self.pages.get(&page_index)?;
        let deletes: Vec<Command> = strokes
            .iter()
            .map(|stroke| Command::DeleteStroke {
                stroke_id: stroke.id,
            })
            .collect();
        (!deletes.is_empty()).then_some(Command::Batch(deletes))
    }

    /// Verifies the document invariants: ids are unique, every stroke is on a
    /// valid page with at least two points, and history replay matches the
    /// live state.
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for (page, strokes) in &self.pages {
            if strokes.is_empty() {
                return Err(format!("page {} is tracked without strokes", page));
            }
            if let Some(count) = self.page_count {
                if *page >= count {
                    return Err(format!("page {} is outside the {} page document", page, count));
                }
            }
            for stroke in strokes {
                if stroke.page_index != *page {
                    return Err(format!("stroke {} is filed under page {}", stroke.id, page));
                }
                stroke.validate()?;
                if !seen.insert(stroke.id) {
                    return Err(format!("stroke id {} appears twice", stroke.id));
                }
                if stroke.id.0 >= self.next_id {
                    return Err(format!("stroke id {} is ahead of the allocator", stroke.id));
                }
            }
        }
        if self.history.replay() != self.pages {
            return Err("history replay does not reproduce the live strokes".to_string());
        }
        Ok(())
    }

    fn commit_replayed(&mut self, change: &Change) {
        apply_change(&mut self.pages, change);
        change.touched(&mut self.damage);
        self.revision += 1;
    }

    /// Validates and applies one command to the live state. A failing batch is
    /// rolled back before the error is returned.
    fn execute(&mut self, command: Command) -> Result<Change, InvalidCommand> {
        match command {
            Command::AddStroke(stroke) => {
                self.check_new_stroke(&stroke)?;
                let index = self.pages.get(&stroke.page_index).map_or(0, Vec::len);
                self.next_id = self.next_id.max(stroke.id.0.saturating_add(1));
                let change = Change::Added {
                    stroke: Arc::new(stroke),
                    index,
                };
                apply_change(&mut self.pages, &change);
                Ok(change)
            }
            Command::DeleteStroke { stroke_id } => {
                let (stroke, index) = self.find(stroke_id)?;
                let change = Change::Deleted { stroke, index };
                apply_change(&mut self.pages, &change);
                Ok(change)
            }
            Command::ChangeStrokeStyle { stroke_id, style } => {
                if !style.is_valid() {
                    return Err(InvalidCommand::InvalidStyle(stroke_id));
                }
                let (before, index) = self.find(stroke_id)?;
                let after = Arc::new(before.with_style(style));
                let change = Change::Restyled {
                    before,
                    after,
                    index,
                };
                apply_change(&mut self.pages, &change);
                Ok(change)
            }
            Command::Batch(commands) => {
                if commands.is_empty() {
                    return Err(InvalidCommand::EmptyBatch);
                }
                let mut done = Vec::with_capacity(commands.len());
                for command in commands {
                    match self.execute(command) {
                        Ok(change) => done.push(change),
                        Err(err) => {
                            for change in done.iter().rev() {
                                apply_change(&mut self.pages, &change.invert());
                            }
                            return Err(err);
                        }
                    }
                }
                Ok(Change::Batch(done))
            }
        }
    }

    fn check_new_stroke(&self, stroke: &Stroke) -> Result<(), InvalidCommand> {
        stroke.validate().map_err(InvalidCommand::MalformedStroke)?;
        if let Some(page_count) = self.page_count {
            if stroke.page_index >= page_count {
                return Err(InvalidCommand::PageOutOfRange {
                    page: stroke.page_index,
                    page_count,
                });
            }
        }
        if self.locate(stroke.id).is_some() || self.history.references(stroke.id) {
            return Err(InvalidCommand::DuplicateStroke(stroke.id));
        }
        let on_page = self.pages.get(&stroke.page_index).map_or(0, Vec::len);
        if on_page >= self.max_strokes_per_page {
            return Err(InvalidCommand::PageFull {
                page: stroke.page_index,
                limit: self.max_strokes_per_page,
            });
        }
        Ok(())
    }

    fn find(&self, id: StrokeId) -> Result<(Arc<Stroke>, usize), InvalidCommand> {
        let (page, index) = self.locate(id).ok_or(InvalidCommand::UnknownStroke(id))?;
        self.pages
            .get(&page)
            .and_then(|strokes| strokes.get(index))
            .map(|stroke| (Arc::clone(stroke), index))
            .ok_or(InvalidCommand::UnknownStroke(id))
    }

    fn locate(&self, id: StrokeId) -> Option<(u32, usize)> {
        self.pages.iter().find_map(|(page, strokes)| {
            strokes
                .iter()
                .position(|s| s.id == id)
                .map(|index| (*page, index))
        })
    }
}

fn stroke_touches_circle(stroke: &Stroke, center: (f64, f64), radius: f64) -> bool {
    let points: Vec<(f64, f64)> = stroke.points.iter().map(|p| p.position()).collect();
    if points.iter().any(|p| distance(*p, center) <= radius) {
        return true;
    }
    points
        .windows(2)
        .any(|pair| segment_distance(center, pair[0], pair[1]) <= radius)
}

fn segment_distance(point: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return distance(point, a);
    }
    let t = (((point.0 - a.0) * dx + (point.1 - a.1) * dy) / length_sq).clamp(0.0, 1.0);
    distance(point, (a.0 + t * dx, a.1 + t * dy))
}
