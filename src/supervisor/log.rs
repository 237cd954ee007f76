//! Durable append-only capture of the guest's combined output.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Error type for run-log operations.
#[derive(thiserror::Error, Debug)]
pub enum RunLogError {
    /// Could not create the log's parent directory.
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Could not create or write the log file.
    #[error("failed to write run log {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Append-only log of every byte the guest emitted.
///
/// Each chunk is flushed as it is written, so the log is complete up to
/// the last processed line even if the run aborts.
#[derive(Debug)]
pub struct RunLog {
    file: std::fs::File,
    path: PathBuf,
}

impl RunLog {
    /// Create (truncate) the log file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns a `RunLogError` if the directory or file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RunLogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| RunLogError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let file = std::fs::File::create(&path).map_err(|source| RunLogError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(Self { file, path })
    }

    /// Append raw bytes and flush.
    ///
    /// # Errors
    ///
    /// Returns a `RunLogError` if the write or flush fails.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), RunLogError> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .map_err(|source| RunLogError::Write {
                path: self.path.clone(),
                source,
            })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
