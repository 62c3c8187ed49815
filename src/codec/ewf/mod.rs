//! Expert Witness Format (E01) codec
//!
//! Reads EnCase-style segment sets: a 13-byte file header per segment followed
//! by a chain of 76-byte section descriptors. Media lives in zlib-compressed or
//! raw chunks located through `table` sections.
//!
//! ## Module Structure
//! - `types` - format constants, section descriptors and volume geometry
//! - `cache` - LRU cache of decoded chunks
//! - `header` - case metadata from header/header2 sections
//! - `reader` - [`EwfReader`], the random-access reader

mod cache;
mod header;
mod reader;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{CodecError, CodecResult, ContainerCodec, ContainerReader};
use crate::common::segments::discover_ewf_parts;

pub use reader::EwfReader;

/// Built-in [`ContainerCodec`] for E01 sets
#[derive(Debug, Clone)]
pub struct EwfCodec {
    max_open_files: usize,
}

impl EwfCodec {
    pub fn new() -> Self {
        Self {
            max_open_files: types::MAX_OPEN_FILES,
        }
    }

    /// Cap on segment files held open by one reader
    pub fn with_max_open_files(mut self, max_open: usize) -> Self {
        self.max_open_files = max_open.max(1);
        self
    }
}

impl Default for EwfCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerCodec for EwfCodec {
    fn name(&self) -> &'static str {
        "ewf"
    }

    fn glob(&self, first: &Path) -> CodecResult<Vec<PathBuf>> {
        if !first.is_file() {
            return Err(CodecError::NoParts(first.to_path_buf()));
        }
        let parts = discover_ewf_parts(first);
        debug!(path = ?first, part_count = parts.len(), "Globbed EWF parts");
        Ok(parts)
    }

    fn open(&self, parts: &[PathBuf]) -> CodecResult<Box<dyn ContainerReader>> {
        Ok(Box::new(EwfReader::open(parts, self.max_open_files)?))
    }
}
