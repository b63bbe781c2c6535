use super::file::{read_payload, with_lock};
use super::options::SessionOptions;
use crate::document::codec;
use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Result of clearing on-disk annotation data.
#[derive(Debug, Clone, Copy)]
pub struct ClearOutcome {
    pub removed_session: bool,
    pub removed_backup: bool,
    pub removed_lock: bool,
}

/// Summary information about a document's annotation file(s).
#[derive(Debug, Clone)]
pub struct SessionInspection {
    pub session_path: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub modified: Option<SystemTime>,
    pub backup_path: PathBuf,
    pub backup_exists: bool,
    pub backup_size_bytes: Option<u64>,
    pub document_id: String,
    pub compressed: bool,
    pub contents: Option<PayloadSummary>,
    /// Set when the file exists but could not be decoded
    pub decode_error: Option<String>,
}

/// Counts taken from a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSummary {
    pub stroke_count: usize,
    /// `(page_index, strokes)` for each annotated page
    pub pages: Vec<(u32, usize)>,
    pub page_count: Option<u32>,
}

/// Remove persisted annotation files (payload, backup, and lock).
pub fn clear_session(options: &SessionOptions) -> Result<ClearOutcome> {
    Ok(ClearOutcome {
        removed_session: remove_file_if_exists(&options.session_file_path())?,
        removed_backup: remove_file_if_exists(&options.backup_file_path())?,
        removed_lock: remove_file_if_exists(&options.lock_file_path())?,
    })
}

/// Inspect the annotation file for CLI reporting.
pub fn inspect_session(options: &SessionOptions) -> Result<SessionInspection> {
    let session_path = options.session_file_path();
    let metadata = fs::metadata(&session_path).ok();
    let exists = metadata.is_some();
    let size_bytes = metadata.as_ref().map(|m| m.len());
    let modified = metadata.as_ref().and_then(|m| m.modified().ok());

    let backup_path = options.backup_file_path();
    let backup_meta = fs::metadata(&backup_path).ok();

    let mut compressed = false;
    let mut contents = None;
    let mut decode_error = None;

    if exists {
        let loaded = with_lock(options, false, || read_payload(&session_path))?;
        compressed = loaded.compressed;
        match codec::decode(&loaded.bytes) {
            Ok(snapshot) => {
                contents = Some(PayloadSummary {
                    stroke_count: snapshot.stroke_count(),
                    pages: snapshot
                        .pages
                        .iter()
                        .map(|(page, strokes)| (*page, strokes.len()))
                        .collect(),
                    page_count: snapshot.page_count,
                });
            }
            Err(err) => {
                warn!(
                    "Annotation file {} could not be decoded: {}",
                    session_path.display(),
                    err
                );
                decode_error = Some(err.to_string());
            }
        }
    }

    Ok(SessionInspection {
        session_path,
        exists,
        size_bytes,
        modified,
        backup_exists: backup_meta.is_some(),
        backup_size_bytes: backup_meta.as_ref().map(|m| m.len()),
        backup_path,
        document_id: options.document_id.clone(),
        compressed,
        contents,
        decode_error,
    })
}

fn remove_file_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(true)
    } else {
        Ok(false)
    }
}
