use crate::config::{SessionCompression, SessionConfig, SessionStorageMode};
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES: u64 = 100 * 1024; // 100 KiB

/// Compression preference for annotation files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Always write plain JSON.
    Off,
    /// Always write gzip-compressed JSON.
    On,
    /// Write gzip when payload exceeds the configured threshold.
    Auto,
}

/// Runtime options derived from configuration for annotation persistence.
///
/// One document maps to one annotation file, named after its sanitized id.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub base_dir: PathBuf,
    pub document_id: String,
    pub max_file_size_bytes: u64,
    pub compression: CompressionMode,
    pub auto_compress_threshold_bytes: u64,
    pub backup_retention: usize,
    pub autosave_interval_ms: u64,
}

impl SessionOptions {
    /// Options with default limits. Intended mainly for tests and tools.
    pub fn new(base_dir: PathBuf, document_id: &str) -> Self {
        Self {
            base_dir,
            document_id: sanitize_identifier(document_id),
            max_file_size_bytes: 10 * 1024 * 1024,
            compression: CompressionMode::Auto,
            auto_compress_threshold_bytes: DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES,
            backup_retention: 1,
            autosave_interval_ms: 30_000,
        }
    }

    pub fn session_file_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.json", self.file_stem()))
    }

    pub fn backup_file_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.json.bak", self.file_stem()))
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.lock", self.file_stem()))
    }

    fn file_stem(&self) -> String {
        format!("annotations-{}", self.document_id)
    }
}

/// Build runtime session options from configuration values.
pub fn options_from_config(
    session_cfg: &SessionConfig,
    config_dir: &Path,
    document_id: &str,
) -> Result<SessionOptions> {
    let base_dir = match session_cfg.storage {
        SessionStorageMode::Auto => {
            let root = dirs::data_dir().unwrap_or_else(|| config_dir.to_path_buf());
            root.join("inkpage")
        }
        SessionStorageMode::Config => config_dir.to_path_buf(),
        SessionStorageMode::Custom => {
            let raw = session_cfg.custom_directory.as_ref().ok_or_else(|| {
                anyhow!("session.custom_directory must be set when storage = \"custom\"")
            })?;
            let expanded = expand_tilde(raw);
            if expanded.as_os_str().is_empty() {
                return Err(anyhow!("session.custom_directory resolved to an empty path"));
            }
            expanded
        }
    };

    let mut options = SessionOptions::new(base_dir, document_id);
    options.max_file_size_bytes = session_cfg
        .max_file_size_mb
        .saturating_mul(1024 * 1024)
        .max(1);
    options.auto_compress_threshold_bytes = session_cfg
        .auto_compress_threshold_kb
        .saturating_mul(1024)
        .max(1);
    options.compression = match session_cfg.compress {
        SessionCompression::Auto => CompressionMode::Auto,
        SessionCompression::On => CompressionMode::On,
        SessionCompression::Off => CompressionMode::Off,
    };
    options.backup_retention = session_cfg.backup_retention;
    options.autosave_interval_ms = session_cfg.autosave_interval_ms;

    Ok(options)
}

/// Maps a document identity (often a file path) onto a safe file name part.
pub(crate) fn sanitize_identifier(raw: &str) -> String {
    if raw.is_empty() {
        return "default".to_string();
    }

    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
