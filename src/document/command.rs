//! Document mutations and their resolved, invertible form.

use crate::draw::{Stroke, StrokeId, StrokeStyle};
use std::sync::Arc;

/// A requested change to the annotation document.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Commit a finished stroke on top of its page
    AddStroke(Stroke),
    DeleteStroke { stroke_id: StrokeId },
    ChangeStrokeStyle { stroke_id: StrokeId, style: StrokeStyle },
    /// Several commands applied all-or-nothing and undone as one step
    Batch(Vec<Command>),
}

impl Command {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AddStroke(_) => "add-stroke",
            Command::DeleteStroke { .. } => "delete-stroke",
            Command::ChangeStrokeStyle { .. } => "change-style",
            Command::Batch(_) => "batch",
        }
    }
}

/// A command after validation against the live state, carrying everything
/// needed to apply or revert it without looking anything up.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    Added {
        stroke: Arc<Stroke>,
        index: usize,
    },
    Deleted {
        stroke: Arc<Stroke>,
        index: usize,
    },
    Restyled {
        before: Arc<Stroke>,
        after: Arc<Stroke>,
        index: usize,
    },
    Batch(Vec<Change>),
}

impl Change {
    /// The change that undoes this one.
    pub fn invert(&self) -> Change {
        match self {
            Change::Added { stroke, index } => Change::Deleted {
                stroke: Arc::clone(stroke),
                index: *index,
            },
            Change::Deleted { stroke, index } => Change::Added {
                stroke: Arc::clone(stroke),
                index: *index,
            },
            Change::Restyled {
                before,
                after,
                index,
            } => Change::Restyled {
                before: Arc::clone(after),
                after: Arc::clone(before),
                index: *index,
            },
            Change::Batch(changes) => Change::Batch(changes.iter().rev().map(Change::invert).collect()),
        }
    }

    /// True when `id` appears anywhere in the change.
    pub fn references(&self, id: StrokeId) -> bool {
        match self {
            Change::Added { stroke, .. } | Change::Deleted { stroke, .. } => stroke.id == id,
            Change::Restyled { before, .. } => before.id == id,
            Change::Batch(changes) => changes.iter().any(|c| c.references(id)),
        }
    }

    /// Every stroke version the change touches, for damage tracking.
    pub fn touched(&self, out: &mut Vec<Arc<Stroke>>) {
        match self {
            Change::Added { stroke, .. } | Change::Deleted { stroke, .. } => out.push(Arc::clone(stroke)),
            Change::Restyled { before, after, .. } => {
                out.push(Arc::clone(before));
                out.push(Arc::clone(after));
            }
            Change::Batch(changes) => changes.iter().for_each(|c| c.touched(out)),
        }
    }
}
