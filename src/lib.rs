//! Stylus input classification and ink annotation engine.
//!
//! Raw touch batches from a document viewer are normalized, filtered by palm
//! rejection, built into pressure-sensitive strokes in page-normalized space
//! and committed to an undoable per-document annotation model. The render
//! dispatcher turns the model into draw lists and damage for the host renderer;
//! the session module persists the annotations between runs.

pub mod config;
pub mod document;
pub mod draw;
pub mod engine;
pub mod ink;
pub mod input;
pub mod render;
pub mod session;
pub mod util;

pub use config::Config;
pub use document::{AnnotationDocument, Command, DocumentError, DocumentStore, HistoryOutcome};
pub use engine::{BatchReport, Engine};
