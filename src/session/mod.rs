//! Annotation persistence.
//!
//! Writes a document's encoded annotations to disk with locking, optional
//! compression and backup rotation, and restores them when the document is
//! opened again.

mod autosave;
mod file;
mod options;
mod storage;

pub use autosave::Autosave;
pub use file::{LoadedPayload, SaveOutcome, load_document, load_payload, save_document, save_payload};
pub use options::{
    CompressionMode, DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES, SessionOptions, options_from_config,
};
pub use storage::{ClearOutcome, PayloadSummary, SessionInspection, clear_session, inspect_session};
