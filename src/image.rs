//! Image handles and the backend factory
//!
//! [`ImageHandle::open`] inspects a path and picks the backend:
//!
//! | Input | Backend |
//! |-------|---------|
//! | directory (recursion allowed) | [`DirectoryBackend`] |
//! | `*.E01`, `*.e01`, names containing `.E01.` | [`ContainerBackend`] |
//! | anything else | [`RawBackend`] |
//!
//! A directory whose top level holds `.E01`, `.000` or `.001` files is
//! refused: those are parts of one image and belong one directory deeper.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{
    BackendKind, ContainerBackend, DirectoryBackend, ImageBackend, RawBackend, SegmentInfo,
};
use crate::codec::parts::E01_INFIX;
use crate::codec::{default_codec, ContainerCodec};
use crate::common::segments::filename_extension;
use crate::config::ImageConfig;
use crate::cursor::Cursor;
use crate::error::{ImageError, Result};
use crate::page::{Page, PositionDescriptor};

/// Top-level extensions that mark a directory of image parts
const IMAGE_PART_EXTENSIONS: [&str; 3] = ["E01", "000", "001"];

/// Serializable summary of an open image
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub kind: BackendKind,
    pub path: String,
    pub size: u64,
    pub max_blocks: u64,
    pub page_size: usize,
    pub margin: usize,
    pub segments: Vec<SegmentInfo>,
    pub details: Vec<String>,
}

/// One open disk image: a backend plus the configuration it was opened with
pub struct ImageHandle {
    backend: Box<dyn ImageBackend>,
    config: ImageConfig,
}

impl ImageHandle {
    /// Open `path` with the codec compiled into this build
    pub fn open(path: impl AsRef<Path>, allow_directory_recursion: bool, config: ImageConfig) -> Result<Self> {
        Self::open_with_codec(path, allow_directory_recursion, config, default_codec())
    }

    /// Open `path`, serving containers through `codec`
    pub fn open_with_codec(
        path: impl AsRef<Path>,
        allow_directory_recursion: bool,
        config: ImageConfig,
        codec: Option<Arc<dyn ContainerCodec>>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let backend = select_backend(path, allow_directory_recursion, &config, codec)?;
        debug!(?path, kind = %backend.kind(), "Selected backend");
        Self::from_backend(backend, config)
    }

    /// Wrap and open an already constructed backend
    pub fn from_backend(mut backend: Box<dyn ImageBackend>, config: ImageConfig) -> Result<Self> {
        config.validate()?;
        backend.open().map_err(|e| match e {
            ImageError::NoSuchFile { .. } | ImageError::InvalidConfig(_) => e,
            other => ImageError::no_such_file(backend.path(), other.to_string()),
        })?;
        info!(
            path = ?backend.path(),
            kind = %backend.kind(),
            size = backend.size(),
            "Image ready"
        );
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    pub fn size(&self) -> u64 {
        self.backend.size()
    }

    pub fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.backend.pread(offset, buf)
    }

    pub fn begin(&self) -> Cursor {
        self.backend.begin()
    }

    pub fn end(&self) -> Cursor {
        self.backend.end()
    }

    pub fn advance(&self, cursor: &mut Cursor) {
        self.backend.advance(cursor)
    }

    pub fn seek_block(&self, cursor: &mut Cursor, block: u64) -> u64 {
        self.backend.seek_block(cursor, block)
    }

    pub fn max_blocks(&self) -> u64 {
        self.backend.max_blocks()
    }

    pub fn fraction_done(&self, cursor: &Cursor) -> f64 {
        self.backend.fraction_done(cursor)
    }

    pub fn describe(&self, cursor: &Cursor) -> String {
        self.backend.describe(cursor)
    }

    pub fn position_of(&self, cursor: &Cursor) -> PositionDescriptor {
        self.backend.position_of(cursor)
    }

    pub fn page_at(&self, cursor: &Cursor) -> Result<Option<Page>> {
        self.backend.page_at(cursor)
    }

    /// Page of block `block`, or `None` past the last block.
    ///
    /// Each call uses its own cursor, so workers can fetch blocks in parallel.
    pub fn page_for_block(&self, block: u64) -> Result<Option<Page>> {
        if block >= self.max_blocks() {
            return Ok(None);
        }
        let mut cursor = self.begin();
        self.seek_block(&mut cursor, block);
        self.page_at(&cursor)
    }

    /// Sequential pages from the beginning of the image
    pub fn pages(&self) -> PageIter<'_> {
        PageIter {
            handle: self,
            cursor: self.begin(),
        }
    }

    /// Container provenance lines ("CASE NUMBER: ...")
    pub fn details(&self) -> &[String] {
        self.backend.details()
    }

    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.backend.segments()
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            kind: self.kind(),
            path: self.path().to_string_lossy().to_string(),
            size: self.size(),
            max_blocks: self.max_blocks(),
            page_size: self.config.page_size,
            margin: self.config.margin,
            segments: self.segments(),
            details: self.details().to_vec(),
        }
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .field("size", &self.size())
            .field("config", &self.config)
            .finish()
    }
}

/// Iterator driving `page_at` + `advance`.
///
/// A failed page is yielded as `Err` and the walk moves on to the next one.
pub struct PageIter<'a> {
    handle: &'a ImageHandle,
    cursor: Cursor,
}

impl PageIter<'_> {
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }
}

impl Iterator for PageIter<'_> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_eof() {
            return None;
        }
        let result = self.handle.page_at(&self.cursor);
        self.handle.advance(&mut self.cursor);
        match result {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.cursor = self.handle.end();
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

fn select_backend(
    path: &Path,
    allow_directory_recursion: bool,
    config: &ImageConfig,
    codec: Option<Arc<dyn ContainerCodec>>,
) -> Result<Box<dyn ImageBackend>> {
    let is_dir = match fs::metadata(path) {
        Ok(metadata) => metadata.is_dir(),
        // UNC shares may refuse a stat yet open fine
        Err(_) if is_windows_unc(path) => false,
        Err(e) => return Err(ImageError::no_such_file(path, e.to_string())),
    };

    if is_dir {
        if !allow_directory_recursion {
            return Err(ImageError::no_such_file(
                path,
                "is a directory but directory recursion is not enabled",
            ));
        }
        if let Some(part) = find_image_part(path)? {
            return Err(ImageError::no_such_file(
                path,
                format!(
                    "contains image part {}; directory recursion is not for EnCase sets or \
                     split raw images. Process them as a single image, or nest them one \
                     directory deeper",
                    part.display()
                ),
            ));
        }
        return Ok(Box::new(DirectoryBackend::new(path)));
    }

    if is_container_path(path) {
        let codec = codec.ok_or_else(|| {
            ImageError::NoSupport("this build has no container codec for E01 images".into())
        })?;
        return Ok(Box::new(ContainerBackend::new(path, config.clone(), codec)));
    }

    Ok(Box::new(RawBackend::new(path, config.clone())))
}

fn is_container_path(path: &Path) -> bool {
    filename_extension(path).eq_ignore_ascii_case("e01") || path.to_string_lossy().contains(E01_INFIX)
}

/// First top-level entry of `dir` that looks like part of a disk image
fn find_image_part(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ImageError::no_such_file(dir, e.to_string()))?;
    Ok(entries.flatten().map(|entry| entry.path()).find(|p| {
        p.extension()
            .is_some_and(|ext| IMAGE_PART_EXTENSIONS.iter().any(|part| ext == OsStr::new(part)))
    }))
}

fn is_windows_unc(path: &Path) -> bool {
    cfg!(windows) && path.to_string_lossy().starts_with(r"\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, vec![0x5a; len]).unwrap();
        path
    }

    #[test]
    fn test_container_detection() {
        assert!(is_container_path(Path::new("/cases/disk.E01")));
        assert!(is_container_path(Path::new("/cases/disk.e01")));
        assert!(is_container_path(Path::new("/cases/disk.E01.9f8e7d")));
        assert!(!is_container_path(Path::new("/cases/disk.E02")));
        assert!(!is_container_path(Path::new("/cases/disk.001")));
    }

    #[test]
    fn test_raw_selected_for_plain_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "disk.dd", 1000);
        let handle = ImageHandle::open(&path, false, ImageConfig::new(256, 16)).unwrap();
        assert_eq!(handle.kind(), BackendKind::Raw);
        assert_eq!(handle.size(), 1000);
        assert_eq!(handle.max_blocks(), 4);
    }

    #[test]
    fn test_pages_iterator() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "disk.dd", 1000);
        let handle = ImageHandle::open(&path, false, ImageConfig::new(256, 16)).unwrap();

        let pages: Vec<Page> = handle.pages().collect::<Result<_>>().unwrap();
        assert_eq!(pages.len(), 4);
        assert_eq!(pages.iter().map(Page::active_len).sum::<usize>(), 1000);
        assert_eq!(pages[3].position().offset, 768);
    }

    #[test]
    fn test_page_for_block() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "disk.dd", 1000);
        let handle = ImageHandle::open(&path, false, ImageConfig::new(256, 16)).unwrap();

        let page = handle.page_for_block(2).unwrap().unwrap();
        assert_eq!(page.position().offset, 512);
        assert_eq!(page.len(), 272);
        assert!(handle.page_for_block(4).unwrap().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "disk.dd", 10);
        let err = ImageHandle::open(&path, false, ImageConfig::new(0, 0)).unwrap_err();
        assert!(matches!(err, ImageError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_backend_rejects_zero_page_size() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "disk.dd", 10);

        let backend = Box::new(RawBackend::new(&path, ImageConfig::default()));
        let err = ImageHandle::from_backend(backend, ImageConfig::new(0, 0)).unwrap_err();
        assert!(matches!(err, ImageError::InvalidConfig(_)));

        // The backend's own config is checked too
        let backend = Box::new(RawBackend::new(&path, ImageConfig::new(0, 0)));
        let err = ImageHandle::from_backend(backend, ImageConfig::default()).unwrap_err();
        assert!(matches!(err, ImageError::InvalidConfig(_)));
    }

    #[test]
    fn test_info_summary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x.000", 100);
        write(dir.path(), "x.001", 50);
        let handle = ImageHandle::open(dir.path().join("x.000"), false, ImageConfig::new(64, 0)).unwrap();

        let info = handle.info();
        assert_eq!(info.kind, BackendKind::Raw);
        assert_eq!(info.size, 150);
        assert_eq!(info.max_blocks, 3);
        assert_eq!(info.segments.len(), 2);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "raw");
    }

    #[test]
    fn test_directory_refuses_top_level_parts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "evidence.E01", 10);
        let err = ImageHandle::open(dir.path(), true, ImageConfig::default()).unwrap_err();
        match err {
            ImageError::NoSuchFile { reason, .. } => assert!(reason.contains("one directory deeper")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
