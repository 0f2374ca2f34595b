//! Failure values of the download pipeline, one type per scope.
//!
//! File, folder and archive errors are recoverable: they are caught at the
//! boundary that owns the unit and turned into counters and log lines.
//! Only [`RunError`] stops a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::base_system::config::ConfigError;
use crate::remote::transport::RemoteError;

/// One candidate file could not be retrieved.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("local {operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("unable to open {path}: {source}")]
    Remote { path: String, source: RemoteError },
    #[error("streaming {path} failed: {source}")]
    Stream { path: String, source: io::Error },
    #[error("size mismatch for {path}: expected {expected}, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    #[error("refusing remote file name {name:?}")]
    UnsafeName { name: String },
}

impl TransferError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// A whole remote folder could not be processed.
#[derive(Debug, Error)]
pub enum FolderError {
    #[error("unable to list remote folder '{folder}': {source}")]
    Listing { folder: String, source: RemoteError },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive {operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("archiving cancelled")]
    Cancelled,
}

impl ArchiveError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Fatal: the run stops before any job executes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("unable to open remote session: {0}")]
    Session(#[source] RemoteError),
}
