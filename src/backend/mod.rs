//! Image backends - one address space and one cursor protocol over four
//! physically different storage strategies.
//!
//! | Backend | Address space | Page |
//! |---------|---------------|------|
//! | [`RawBackend`] | bytes of one file or of split parts | `page_size + margin` window |
//! | [`ContainerBackend`] | decoded media bytes of an evidence container | `page_size + margin` window |
//! | [`DirectoryBackend`] | ordinals of the regular files under a root | whole file |
//!
//! Byte-addressed backends share their cursor arithmetic and page assembly
//! through [`ByteGeometry`].

mod container;
mod directory;
mod raw;

pub use container::ContainerBackend;
pub use directory::DirectoryBackend;
pub use raw::{RawBackend, Segment};

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::cursor::Cursor;
use crate::error::{ImageError, ReadErrorKind, Result};
use crate::page::{Page, PositionDescriptor};

/// Which storage strategy a backend implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Raw,
    Container,
    Directory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Raw => write!(f, "raw"),
            BackendKind::Container => write!(f, "container"),
            BackendKind::Directory => write!(f, "directory"),
        }
    }
}

/// One physical file of a split raw image, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    pub path: String,
    pub start: u64,
    pub length: u64,
}

/// Contract every backend implements.
///
/// Read paths take `&self` and must tolerate concurrent callers; cursors are
/// plain values owned by whoever asked for them.
pub trait ImageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Path the backend was constructed from
    fn path(&self) -> &Path;

    /// Acquire the underlying storage. Calling it again is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Bytes for raw and container images, file count for directories
    fn size(&self) -> u64;

    /// Positioned read; fewer than `buf.len()` bytes only at end of image
    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    fn begin(&self) -> Cursor;

    fn end(&self) -> Cursor;

    /// Move exactly one page forward, saturating at the end
    fn advance(&self, cursor: &mut Cursor);

    /// Position `cursor` at `block`, clamped to the last valid block.
    /// Returns the block actually used.
    fn seek_block(&self, cursor: &mut Cursor, block: u64) -> u64;

    fn max_blocks(&self) -> u64;

    /// Progress in `[0, 1]`
    fn fraction_done(&self, cursor: &Cursor) -> f64;

    /// Human-readable progress label
    fn describe(&self, cursor: &Cursor) -> String;

    fn position_of(&self, cursor: &Cursor) -> PositionDescriptor;

    /// Page at `cursor`, or `None` at end of image
    fn page_at(&self, cursor: &Cursor) -> Result<Option<Page>>;

    /// Physical parts of the image, when it has any
    fn segments(&self) -> Vec<SegmentInfo> {
        Vec::new()
    }

    /// Provenance metadata harvested at open time
    fn details(&self) -> &[String] {
        &[]
    }
}

// =============================================================================
// Byte-addressed geometry shared by raw and container backends
// =============================================================================

/// Cursor arithmetic over `[0, size)` in blocks of `page_size` bytes
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteGeometry {
    pub size: u64,
    pub page_size: usize,
    pub margin: usize,
}

impl ByteGeometry {
    pub fn begin(&self) -> Cursor {
        Cursor::at_offset(0, self.size == 0)
    }

    pub fn end(&self) -> Cursor {
        Cursor::at_offset(self.size, true)
    }

    pub fn advance(&self, cursor: &mut Cursor) {
        cursor.step_bytes(self.page_size as u64, self.size);
    }

    pub fn max_blocks(&self) -> u64 {
        self.size.div_ceil(self.page_size as u64)
    }

    pub fn seek_block(&self, cursor: &mut Cursor, block: u64) -> u64 {
        let block = block.min(self.max_blocks().saturating_sub(1));
        let offset = block.saturating_mul(self.page_size as u64).min(self.size);
        *cursor = Cursor::at_offset(offset, offset >= self.size);
        block
    }

    /// Offset the cursor points at; foreign cursors count as the end
    pub fn offset_of(&self, cursor: &Cursor) -> u64 {
        cursor.byte_offset().unwrap_or(self.size).min(self.size)
    }

    pub fn fraction_done(&self, cursor: &Cursor) -> f64 {
        if self.size == 0 {
            return 1.0;
        }
        self.offset_of(cursor) as f64 / self.size as f64
    }

    pub fn describe(&self, cursor: &Cursor) -> String {
        format!("Offset {}MB", self.offset_of(cursor) / 1_000_000)
    }

    pub fn position_of(&self, cursor: &Cursor) -> PositionDescriptor {
        PositionDescriptor::at_offset(self.offset_of(cursor))
    }

    /// Assemble the page at `cursor` from positioned reads.
    ///
    /// Reads `min(page_size + margin, remaining)` bytes. Zero bytes means the
    /// image really ended; anything short of the window is a read error.
    pub fn read_page<F>(&self, cursor: &Cursor, pread: F) -> Result<Option<Page>>
    where
        F: FnOnce(u64, &mut [u8]) -> Result<usize>,
    {
        let offset = self.offset_of(cursor);
        let remaining = self.size - offset;
        let window = (self.page_size as u64)
            .saturating_add(self.margin as u64)
            .min(remaining) as usize;
        if window == 0 {
            return Ok(None);
        }
        let active = window.min(self.page_size);

        let mut buf = vec![0u8; window];
        let count = pread(offset, &mut buf)?;
        if count == 0 {
            return Ok(None);
        }
        if count < window {
            return Err(ImageError::read(
                offset,
                ReadErrorKind::Short {
                    expected: window,
                    actual: count,
                },
            ));
        }
        Ok(Some(Page::owned(buf, active, PositionDescriptor::at_offset(offset))))
    }
}

/// Log a mid-scan read error when the handle's policy asks for it
pub(crate) fn report_read_error(report: bool, err: &ImageError) {
    if report {
        warn!(error = %err, "Read error");
    }
}
