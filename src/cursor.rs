//! Cursor - caller-owned progress marker over a backend's address space

use serde::Serialize;

/// Where a cursor points: a byte address or a file ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorPosition {
    /// Raw and container backends
    ByteOffset(u64),
    /// Directory backend
    FileIndex(usize),
}

/// Progress through one image. Only backends move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    position: CursorPosition,
    eof: bool,
}

impl Cursor {
    pub(crate) fn at_offset(offset: u64, eof: bool) -> Self {
        Self {
            position: CursorPosition::ByteOffset(offset),
            eof,
        }
    }

    pub(crate) fn at_file(index: usize, eof: bool) -> Self {
        Self {
            position: CursorPosition::FileIndex(index),
            eof,
        }
    }

    pub fn position(&self) -> CursorPosition {
        self.position
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Byte offset, or `None` for a directory cursor
    pub fn byte_offset(&self) -> Option<u64> {
        match self.position {
            CursorPosition::ByteOffset(offset) => Some(offset),
            CursorPosition::FileIndex(_) => None,
        }
    }

    /// File ordinal, or `None` for a byte cursor
    pub fn file_index(&self) -> Option<usize> {
        match self.position {
            CursorPosition::FileIndex(index) => Some(index),
            CursorPosition::ByteOffset(_) => None,
        }
    }

    /// Move forward by `step` bytes, saturating at `limit`
    pub(crate) fn step_bytes(&mut self, step: u64, limit: u64) {
        let offset = self.byte_offset().unwrap_or(limit);
        let next = offset.saturating_add(step).min(limit);
        self.position = CursorPosition::ByteOffset(next);
        self.eof = next >= limit;
    }

    /// Move to the next file, saturating at `count`
    pub(crate) fn step_file(&mut self, count: usize) {
        let index = self.file_index().unwrap_or(count);
        let next = index.saturating_add(1).min(count);
        self.position = CursorPosition::FileIndex(next);
        self.eof = next >= count;
    }
}
