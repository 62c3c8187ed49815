//! Error types for opening and paging images

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for image operations
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors that can occur while opening or reading an image
#[derive(Debug, Error)]
pub enum ImageError {
    /// Missing path, failed open, failed split reconstruction or a
    /// directory shape that must not be scanned as plain files
    #[error("no such file: {}: {reason}", path.display())]
    NoSuchFile { path: PathBuf, reason: String },

    /// Container image requested but no codec is available
    #[error("not supported: {0}")]
    NoSupport(String),

    /// Mid-scan read failure, fatal to the page being produced
    #[error("read error at offset {offset}: {kind}")]
    Read { offset: u64, kind: ReadErrorKind },

    /// Operation the backend has no meaning for
    #[error("{backend} backend does not support {operation}")]
    UnsupportedOperation {
        backend: &'static str,
        operation: &'static str,
    },

    /// Every probed offset up to 2^59 was readable
    #[error("device size probe exhausted: no readable upper bound below 2^59")]
    ProbeExhausted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What went wrong in a `ImageError::Read`
#[derive(Debug, Error)]
pub enum ReadErrorKind {
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("short read: expected {expected} bytes, got {actual}")]
    Short { expected: usize, actual: usize },

    #[error("container codec: {0}")]
    Codec(String),

    #[error("cannot map {}: {source}", path.display())]
    Map { path: PathBuf, source: io::Error },
}

impl ImageError {
    pub(crate) fn no_such_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ImageError::NoSuchFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn read(offset: u64, kind: impl Into<ReadErrorKind>) -> Self {
        ImageError::Read {
            offset,
            kind: kind.into(),
        }
    }

    /// True for errors raised before any page could be produced
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            ImageError::NoSuchFile { .. } | ImageError::NoSupport(_) | ImageError::InvalidConfig(_)
        )
    }
}
