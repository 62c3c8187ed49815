//! Evidence-container codecs
//!
//! The container backend never looks inside a container format. It talks to a
//! [`ContainerCodec`] that can list the parts of a container, open them and
//! serve random reads of the decoded media. Dropping the returned
//! [`ContainerReader`] closes it.
//!
//! A built-in codec for the Expert Witness Format ships behind the `ewf`
//! cargo feature; [`default_codec`] returns it when compiled in.

pub mod parts;

#[cfg(feature = "ewf")]
pub mod ewf;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Errors reported by a codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid container: {0}")]
    InvalidFormat(String),

    #[error("offset {offset} is out of bounds (size {size})")]
    OutOfBounds { offset: u64, size: u64 },

    #[error("no container parts found for {}", .0.display())]
    NoParts(PathBuf),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Free-text case metadata a container may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    Notes,
    CaseNumber,
    EvidenceNumber,
    ExaminerName,
}

impl HeaderField {
    /// Harvest order used for provenance details
    pub const ALL: [HeaderField; 4] = [
        HeaderField::Notes,
        HeaderField::CaseNumber,
        HeaderField::EvidenceNumber,
        HeaderField::ExaminerName,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HeaderField::Notes => "NOTES",
            HeaderField::CaseNumber => "CASE NUMBER",
            HeaderField::EvidenceNumber => "EVIDENCE NUMBER",
            HeaderField::ExaminerName => "EXAMINER NAME",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entry point of a container library
pub trait ContainerCodec: Send + Sync {
    /// Short format name used in log lines
    fn name(&self) -> &'static str;

    /// All parts of the container whose first part is `first`, in order
    fn glob(&self, first: &Path) -> CodecResult<Vec<PathBuf>>;

    /// Open the container made of `parts`
    fn open(&self, parts: &[PathBuf]) -> CodecResult<Box<dyn ContainerReader>>;
}

/// An open container. Must tolerate concurrent `read_random` calls.
pub trait ContainerReader: Send + Sync {
    /// Size of the decoded media in bytes
    fn media_size(&self) -> u64;

    /// Read decoded media at `offset`; short only at the end of the media
    fn read_random(&self, buf: &mut [u8], offset: u64) -> CodecResult<usize>;

    /// Case metadata, when the container stores it
    fn header_value(&self, _field: HeaderField) -> Option<String> {
        None
    }
}

/// Codec compiled into this build, if any
pub fn default_codec() -> Option<Arc<dyn ContainerCodec>> {
    #[cfg(feature = "ewf")]
    {
        Some(Arc::new(ewf::EwfCodec::new()))
    }
    #[cfg(not(feature = "ewf"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_labels() {
        let labels: Vec<&str> = HeaderField::ALL.iter().map(HeaderField::label).collect();
        assert_eq!(
            labels,
            vec!["NOTES", "CASE NUMBER", "EVIDENCE NUMBER", "EXAMINER NAME"]
        );
    }

    #[test]
    fn test_default_codec_matches_features() {
        assert_eq!(default_codec().is_some(), cfg!(feature = "ewf"));
    }
}
