// Directory backend: every regular file under a root becomes one page

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::{BackendKind, ImageBackend};
use crate::cursor::Cursor;
use crate::error::{ImageError, ReadErrorKind, Result};
use crate::page::{Page, PositionDescriptor};

/// Per-file iteration over a directory tree.
///
/// Files are kept in traversal order, which is not guaranteed to be lexical.
pub struct DirectoryBackend {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl DirectoryBackend {
    /// Enumerate every regular file under `root`.
    ///
    /// Symlinks to regular files are included; symlinked directories are not
    /// descended into.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut files = Vec::new();
        for entry in WalkDir::new(&root) {
            match entry {
                Ok(entry) if is_regular_file(&entry) => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping unreadable directory entry"),
            }
        }
        debug!(?root, file_count = files.len(), "Enumerated directory image");
        Self { root, files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn index_of(&self, cursor: &Cursor) -> usize {
        cursor.file_index().unwrap_or(self.files.len()).min(self.files.len())
    }

    fn map_file(path: &Path) -> Result<Page> {
        let map_err = |source| {
            ImageError::read(
                0,
                ReadErrorKind::Map {
                    path: path.to_path_buf(),
                    source,
                },
            )
        };
        let file = File::open(path).map_err(map_err)?;
        let len = file.metadata().map_err(map_err)?.len();
        let position = PositionDescriptor::in_file(path);
        if len == 0 {
            return Ok(Page::owned(Vec::new(), 0, position));
        }
        // SAFETY: the map is read-only; evidence files are not expected to
        // change while a scan holds them.
        let map = unsafe { Mmap::map(&file) }.map_err(map_err)?;
        Ok(Page::mapped(map, position))
    }
}

/// Regular file, or a symlink resolving to one
fn is_regular_file(entry: &DirEntry) -> bool {
    if entry.path_is_symlink() {
        return entry.path().is_file();
    }
    entry.file_type().is_file()
}

impl ImageBackend for DirectoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.files.len() as u64
    }

    fn pread(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize> {
        Err(ImageError::UnsupportedOperation {
            backend: "directory",
            operation: "pread",
        })
    }

    fn begin(&self) -> Cursor {
        Cursor::at_file(0, self.files.is_empty())
    }

    fn end(&self) -> Cursor {
        Cursor::at_file(self.files.len(), true)
    }

    fn advance(&self, cursor: &mut Cursor) {
        cursor.step_file(self.files.len());
    }

    fn seek_block(&self, cursor: &mut Cursor, block: u64) -> u64 {
        let last = self.files.len().saturating_sub(1) as u64;
        let block = block.min(last);
        let index = block as usize;
        *cursor = Cursor::at_file(index, index >= self.files.len());
        block
    }

    fn max_blocks(&self) -> u64 {
        self.files.len() as u64
    }

    fn fraction_done(&self, cursor: &Cursor) -> f64 {
        if self.files.is_empty() {
            return 1.0;
        }
        self.index_of(cursor) as f64 / self.files.len() as f64
    }

    fn describe(&self, cursor: &Cursor) -> String {
        match self.files.get(self.index_of(cursor)) {
            Some(path) => format!("File {}", path.display()),
            None => format!("End of {}", self.root.display()),
        }
    }

    fn position_of(&self, cursor: &Cursor) -> PositionDescriptor {
        match self.files.get(self.index_of(cursor)) {
            Some(path) => PositionDescriptor::in_file(path),
            None => PositionDescriptor::at_offset(0),
        }
    }

    fn page_at(&self, cursor: &Cursor) -> Result<Option<Page>> {
        match self.files.get(self.index_of(cursor)) {
            Some(path) => Self::map_file(path).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mail/inbox")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"meet at noon").unwrap();
        fs::write(dir.path().join("mail/inbox/1.eml"), b"From: a@example.com").unwrap();
        fs::write(dir.path().join("mail/empty.dat"), b"").unwrap();
        dir
    }

    #[test]
    fn test_enumerates_nested_files() {
        let dir = tree();
        let backend = DirectoryBackend::new(dir.path());
        assert_eq!(backend.size(), 3);

        let found: HashSet<PathBuf> = backend.files().iter().cloned().collect();
        assert!(found.contains(&dir.path().join("notes.txt")));
        assert!(found.contains(&dir.path().join("mail/inbox/1.eml")));
        assert!(found.contains(&dir.path().join("mail/empty.dat")));
    }

    #[test]
    fn test_one_page_per_file() {
        let dir = tree();
        let backend = DirectoryBackend::new(dir.path());

        let mut cursor = backend.begin();
        assert_eq!(backend.fraction_done(&cursor), 0.0);
        let mut steps = 0;
        while !cursor.is_eof() {
            let page = backend.page_at(&cursor).unwrap().unwrap();
            let path = page.position().path_hint().unwrap().to_path_buf();
            assert_eq!(page.position().offset, 0);
            assert_eq!(page.data(), fs::read(&path).unwrap().as_slice());
            assert_eq!(page.active_len(), page.len());
            assert!(page.margin().is_empty());
            assert_eq!(backend.describe(&cursor), format!("File {}", path.display()));
            backend.advance(&mut cursor);
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(backend.fraction_done(&cursor), 1.0);
        assert!(backend.page_at(&cursor).unwrap().is_none());
    }

    #[test]
    fn test_pread_unsupported() {
        let dir = tree();
        let backend = DirectoryBackend::new(dir.path());
        let mut buf = [0u8; 8];
        for offset in [0, 1, 4096, u64::MAX] {
            assert!(matches!(
                backend.pread(offset, &mut buf),
                Err(ImageError::UnsupportedOperation { .. })
            ));
        }
    }

    #[test]
    fn test_seek_block_clamps_to_last_file() {
        let dir = tree();
        let backend = DirectoryBackend::new(dir.path());
        let mut cursor = backend.begin();
        assert_eq!(backend.seek_block(&mut cursor, 10), 2);
        assert_eq!(cursor.file_index(), Some(2));
        assert!(!cursor.is_eof());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_included() {
        use std::os::unix::fs::symlink;

        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("real.txt"), b"linked evidence").unwrap();
        fs::create_dir(outside.path().join("sub")).unwrap();
        fs::write(outside.path().join("sub/hidden.txt"), b"x").unwrap();

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.txt"), b"plain").unwrap();
        symlink(outside.path().join("real.txt"), dir.path().join("link.txt")).unwrap();
        symlink(outside.path().join("sub"), dir.path().join("linkdir")).unwrap();
        symlink(outside.path().join("gone.txt"), dir.path().join("dangling.txt")).unwrap();

        let backend = DirectoryBackend::new(dir.path());
        let found: HashSet<PathBuf> = backend.files().iter().cloned().collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&dir.path().join("plain.txt")));
        assert!(found.contains(&dir.path().join("link.txt")));

        let mut cursor = backend.begin();
        while let Some(page) = backend.page_at(&cursor).unwrap() {
            if page.position().path_hint() == Some(dir.path().join("link.txt").as_path()) {
                assert_eq!(page.data(), b"linked evidence");
            }
            backend.advance(&mut cursor);
        }
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let backend = DirectoryBackend::new(dir.path());
        assert!(backend.begin().is_eof());
        assert_eq!(backend.fraction_done(&backend.begin()), 1.0);
        assert!(backend.page_at(&backend.begin()).unwrap().is_none());
    }
}
