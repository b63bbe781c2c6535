//! Shared handle to one annotation document.
//!
//! The ink thread mutates through [`DocumentStore::apply`] while the render and
//! autosave paths read concurrently. Readers receive owned `Arc<Stroke>` lists
//! or a [`DocumentSnapshot`], so no lock is held while they work.

use super::{AnnotationDocument, Command, DocumentError, DocumentSnapshot, HistoryOutcome, codec};
use crate::config::DocumentConfig;
use crate::draw::{Stroke, StrokeId};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    inner: Arc<RwLock<AnnotationDocument>>,
}

impl DocumentStore {
    pub fn new(config: &DocumentConfig) -> Self {
        Self::from_document(AnnotationDocument::new(config))
    }

    pub fn from_document(document: AnnotationDocument) -> Self {
        Self {
            inner: Arc::new(RwLock::new(document)),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, AnnotationDocument> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, AnnotationDocument> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, command: Command) -> Result<(), DocumentError> {
        self.write_guard().apply(command)
    }

    pub fn undo(&self) -> HistoryOutcome {
        self.write_guard().undo()
    }

    pub fn redo(&self) -> HistoryOutcome {
        self.write_guard().redo()
    }

    pub fn next_stroke_id(&self) -> StrokeId {
        self.write_guard().next_stroke_id()
    }

    pub fn strokes_for_page(&self, page_index: u32) -> Vec<Arc<Stroke>> {
        self.read_guard().strokes_for_page(page_index)
    }

    pub fn revision(&self) -> u64 {
        self.read_guard().revision()
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.read_guard().snapshot()
    }

    /// Encodes the current state; encoding happens after the lock is released.
    pub fn serialize(&self) -> Result<Vec<u8>, DocumentError> {
        let snapshot = self.snapshot();
        Ok(codec::encode(&snapshot)?)
    }

    /// Decodes outside the lock, then swaps the state in.
    pub fn load(&self, bytes: &[u8]) -> Result<(), DocumentError> {
        let snapshot = codec::decode(bytes)?;
        self.write_guard().restore(snapshot);
        Ok(())
    }

    pub fn take_damage(&self) -> Vec<Arc<Stroke>> {
        self.write_guard().take_damage()
    }

    /// Runs `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&AnnotationDocument) -> R) -> R {
        f(&self.read_guard())
    }

    /// Runs `f` with exclusive access to the document.
    pub fn write<R>(&self, f: impl FnOnce(&mut AnnotationDocument) -> R) -> R {
        f(&mut self.write_guard())
    }
}
