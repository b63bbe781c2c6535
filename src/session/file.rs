use super::options::{CompressionMode, SessionOptions};
use crate::document::{DocumentStore, codec};
use anyhow::{Context, Result};
use flate2::{Compression, bufread::GzDecoder, write::GzEncoder};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// What a save attempt did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written {
        path: PathBuf,
        bytes: usize,
        compressed: bool,
    },
    /// The document has no strokes; any previous file was removed
    RemovedEmpty { removed: bool },
    /// The payload exceeded `max_file_size_bytes`; nothing was touched
    SkippedTooLarge { bytes: usize },
}

/// Raw payload read back from disk.
pub struct LoadedPayload {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

/// Persist the live strokes of `store`.
///
/// The document is copied under its read lock; encoding and all file work
/// happen after the lock is released.
pub fn save_document(store: &DocumentStore, options: &SessionOptions) -> Result<SaveOutcome> {
    let snapshot = store.snapshot();
    if snapshot.stroke_count() == 0 {
        if !options.session_file_path().exists() {
            return Ok(SaveOutcome::RemovedEmpty { removed: false });
        }
        return with_lock(options, true, || remove_empty(options));
    }
    let payload = codec::encode(&snapshot).context("failed to serialise annotations")?;
    save_payload(&payload, options)
}

/// Write an already encoded payload with locking, backup rotation and
/// optional compression.
pub fn save_payload(payload: &[u8], options: &SessionOptions) -> Result<SaveOutcome> {
    fs::create_dir_all(&options.base_dir).with_context(|| {
        format!(
            "failed to create annotation directory {}",
            options.base_dir.display()
        )
    })?;
    with_lock(options, true, || save_payload_inner(payload, options))
}

fn save_payload_inner(payload: &[u8], options: &SessionOptions) -> Result<SaveOutcome> {
    let session_path = options.session_file_path();
    let backup_path = options.backup_file_path();

    if payload.len() as u64 > options.max_file_size_bytes {
        warn!(
            "Annotation data size {} bytes exceeds the configured limit of {} bytes; skipping save",
            payload.len(),
            options.max_file_size_bytes
        );
        return Ok(SaveOutcome::SkippedTooLarge {
            bytes: payload.len(),
        });
    }

    let should_compress = match options.compression {
        CompressionMode::Off => false,
        CompressionMode::On => true,
        CompressionMode::Auto => (payload.len() as u64) >= options.auto_compress_threshold_bytes,
    };

    let compressed_bytes;
    let file_bytes: &[u8] = if should_compress {
        compressed_bytes = compress_bytes(payload)?;
        &compressed_bytes
    } else {
        payload
    };

    let tmp_path = temp_path(&session_path);
    {
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .with_context(|| {
                format!(
                    "failed to open temporary annotation file {}",
                    tmp_path.display()
                )
            })?;
        tmp_file
            .write_all(file_bytes)
            .context("failed to write annotation payload")?;
        tmp_file
            .sync_all()
            .context("failed to sync temporary annotation file")?;
    }

    if session_path.exists() {
        if options.backup_retention > 0 {
            if backup_path.exists() {
                if let Err(err) = fs::remove_file(&backup_path) {
                    warn!(
                        "Failed to remove previous backup {}: {}",
                        backup_path.display(),
                        err
                    );
                }
            }
            fs::rename(&session_path, &backup_path).with_context(|| {
                format!(
                    "failed to rotate previous annotation file {} -> {}",
                    session_path.display(),
                    backup_path.display()
                )
            })?;
        } else if let Err(err) = fs::remove_file(&session_path) {
            warn!(
                "Failed to remove previous annotation file {}: {}",
                session_path.display(),
                err
            );
        }
    }

    fs::rename(&tmp_path, &session_path).with_context(|| {
        format!(
            "failed to move temporary annotation file {} -> {}",
            tmp_path.display(),
            session_path.display()
        )
    })?;

    info!(
        "Annotations saved to {} ({} bytes, compression={})",
        session_path.display(),
        file_bytes.len(),
        should_compress
    );

    Ok(SaveOutcome::Written {
        path: session_path,
        bytes: file_bytes.len(),
        compressed: should_compress,
    })
}

fn remove_empty(options: &SessionOptions) -> Result<SaveOutcome> {
    let session_path = options.session_file_path();
    if !session_path.exists() {
        return Ok(SaveOutcome::RemovedEmpty { removed: false });
    }
    debug!(
        "Removing annotation file {} because the document is empty",
        session_path.display()
    );
    fs::remove_file(&session_path).with_context(|| {
        format!(
            "failed to remove empty annotation file {}",
            session_path.display()
        )
    })?;
    Ok(SaveOutcome::RemovedEmpty { removed: true })
}

/// Load the saved annotations into `store`.
///
/// Returns `Ok(false)` when there is nothing to load. A payload that fails to
/// decode leaves the store exactly as it was.
pub fn load_document(store: &DocumentStore, options: &SessionOptions) -> Result<bool> {
    let Some(loaded) = load_payload(options)? else {
        return Ok(false);
    };
    store.load(&loaded.bytes).with_context(|| {
        format!(
            "failed to restore annotations from {}",
            options.session_file_path().display()
        )
    })?;
    info!(
        "Restored {} strokes from {}",
        store.read(|doc| doc.stroke_count()),
        options.session_file_path().display()
    );
    Ok(true)
}

/// Read and decompress the saved payload without decoding it.
pub fn load_payload(options: &SessionOptions) -> Result<Option<LoadedPayload>> {
    let session_path = options.session_file_path();
    if !session_path.exists() {
        debug!(
            "No annotation file present at {}, skipping load",
            session_path.display()
        );
        return Ok(None);
    }

    let metadata = fs::metadata(&session_path)
        .with_context(|| format!("failed to stat annotation file {}", session_path.display()))?;
    if metadata.len() > options.max_file_size_bytes {
        warn!(
            "Annotation file {} is {} bytes which exceeds the configured limit ({} bytes); refusing to load",
            session_path.display(),
            metadata.len(),
            options.max_file_size_bytes
        );
        return Ok(None);
    }

    with_lock(options, false, || read_payload(&session_path)).map(Some)
}

pub(crate) fn read_payload(session_path: &Path) -> Result<LoadedPayload> {
    let mut file_bytes = Vec::new();
    {
        let mut file = File::open(session_path).with_context(|| {
            format!("failed to open annotation file {}", session_path.display())
        })?;
        file.read_to_end(&mut file_bytes)
            .context("failed to read annotation file")?;
    }

    let compressed = is_gzip(&file_bytes);
    let bytes = if compressed {
        let mut decoder = GzDecoder::new(&file_bytes[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .context("failed to decompress annotation file")?;
        out
    } else {
        file_bytes
    };

    Ok(LoadedPayload { bytes, compressed })
}

/// Runs `f` while holding the document's lock file, exclusive for writers.
pub(crate) fn with_lock<T>(
    options: &SessionOptions,
    exclusive: bool,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let lock_path = options.lock_file_path();
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open annotation lock file {}", lock_path.display()))?;
    if exclusive {
        lock_file
            .lock_exclusive()
            .with_context(|| format!("failed to lock annotation file {}", lock_path.display()))?;
    } else {
        lock_file.lock_shared().with_context(|| {
            format!("failed to acquire shared lock {}", lock_path.display())
        })?;
    }

    let result = f();

    lock_file.unlock().unwrap_or_else(|err| {
        warn!(
            "failed to unlock annotation file {}: {}",
            lock_path.display(),
            err
        )
    });

    result
}

fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .context("failed to compress annotation payload")?;
    encoder
        .finish()
        .context("failed to finalise compressed annotation payload")
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn temp_path(target: &Path) -> PathBuf {
    let mut candidate = target.with_extension("json.tmp");
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = target.with_extension(format!("json.tmp{}", counter));
    }
    candidate
}
