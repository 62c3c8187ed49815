//! Pages handed to scanners and the provenance tag attached to each one

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::Serialize;

/// Provenance of a page: file path for directory entries, byte address otherwise
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PositionDescriptor {
    pub path_hint: Option<PathBuf>,
    pub offset: u64,
}

impl PositionDescriptor {
    pub fn at_offset(offset: u64) -> Self {
        Self {
            path_hint: None,
            offset,
        }
    }

    pub fn in_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path_hint: Some(path.into()),
            offset: 0,
        }
    }

    pub fn path_hint(&self) -> Option<&Path> {
        self.path_hint.as_deref()
    }
}

impl fmt::Display for PositionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path_hint {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "{}", self.offset),
        }
    }
}

enum PageData {
    Owned(Box<[u8]>),
    Mapped(Mmap),
}

impl Deref for PageData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            PageData::Owned(buf) => buf,
            PageData::Mapped(map) => map,
        }
    }
}

/// Immutable window of image bytes.
///
/// `data()` holds up to `page_size + margin` bytes. Scanners treat only the
/// first `active_len()` bytes as authoritative; the rest is the margin and is
/// there so patterns crossing into the next page are still visible.
pub struct Page {
    data: PageData,
    active_len: usize,
    position: PositionDescriptor,
}

impl Page {
    pub(crate) fn owned(buf: Vec<u8>, active_len: usize, position: PositionDescriptor) -> Self {
        debug_assert!(active_len <= buf.len());
        Self {
            data: PageData::Owned(buf.into_boxed_slice()),
            active_len,
            position,
        }
    }

    /// Whole-file page: everything is active, no margin
    pub(crate) fn mapped(map: Mmap, position: PositionDescriptor) -> Self {
        let active_len = map.len();
        Self {
            data: PageData::Mapped(map),
            active_len,
            position,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn active(&self) -> &[u8] {
        &self.data[..self.active_len]
    }

    pub fn margin(&self) -> &[u8] {
        &self.data[self.active_len..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active_len
    }

    pub fn position(&self) -> &PositionDescriptor {
        &self.position
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.data, PageData::Mapped(_))
    }
}

impl Deref for Page {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("position", &self.position)
            .field("len", &self.len())
            .field("active_len", &self.active_len)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(PositionDescriptor::at_offset(16777216).to_string(), "16777216");
        let pos = PositionDescriptor::in_file("/cases/42/mail.pst");
        assert_eq!(pos.to_string(), "/cases/42/mail.pst");
        assert_eq!(pos.offset, 0);
    }

    #[test]
    fn test_active_and_margin_split() {
        let page = Page::owned(b"abcdefgh".to_vec(), 6, PositionDescriptor::at_offset(0));
        assert_eq!(page.active(), b"abcdef");
        assert_eq!(page.margin(), b"gh");
        assert_eq!(page.len(), 8);
        assert!(!page.is_mapped());
        assert_eq!(&page[..2], b"ab");
    }
}
