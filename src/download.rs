//! Download Delivery
//!
//! Where an exported card ends up. The CLI writes into a downloads
//! directory; embedders may keep bytes in memory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid download filename: {0:?}")]
    InvalidFilename(String),

    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// Receipt for a delivered file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub filename: String,
    pub mime: String,
    pub size: usize,
    #[serde(default)]
    pub location: Option<PathBuf>,
}

pub trait DownloadSink {
    fn deliver(&mut self, filename: &str, mime: &str, bytes: &[u8]) -> Result<Download, DownloadError>;
}

/// Filenames come from user text, so path separators never survive.
fn safe_filename(filename: &str) -> Result<String, DownloadError> {
    let cleaned: String = filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        return Err(DownloadError::InvalidFilename(filename.to_string()));
    }
    Ok(cleaned)
}

pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, filename: &str, mime: &str, bytes: &[u8]) -> Result<Download, DownloadError> {
        let filename = safe_filename(filename)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&filename);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "wrote download");

        Ok(Download {
            filename,
            mime: mime.to_string(),
            size: bytes.len(),
            location: Some(path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoredDownload {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub downloads: Vec<StoredDownload>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, filename: &str, mime: &str, bytes: &[u8]) -> Result<Download, DownloadError> {
        let filename = safe_filename(filename)?;
        self.downloads.push(StoredDownload {
            filename: filename.clone(),
            mime: mime.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(Download {
            filename,
            mime: mime.to_string(),
            size: bytes.len(),
            location: None,
        })
    }
}
