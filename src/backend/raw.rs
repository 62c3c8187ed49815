// RAW disk image backend (.dd, .raw, .img, devices, .000/.001 splits, 001.vmdk)
// Reconstructs one logical address space out of single or multi-part images

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{report_read_error, BackendKind, ByteGeometry, ImageBackend, SegmentInfo};
use crate::common::{is_multipart_file, read_at, FileIoPool, SplitTemplate};
use crate::config::ImageConfig;
use crate::cursor::Cursor;
use crate::error::{ImageError, Result};
use crate::page::{Page, PositionDescriptor};
use crate::probe;

// =============================================================================
// Segments
// =============================================================================

/// Contiguous run of the logical address space held by one physical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
}

impl Segment {
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos < self.end()
    }
}

/// Ordered segments plus the handle pool that serves them
struct SplitFileIndex {
    segments: Vec<Segment>,
    pool: FileIoPool,
}

impl SplitFileIndex {
    fn build(paths: Vec<PathBuf>, max_open: usize) -> Result<Self> {
        let mut segments = Vec::with_capacity(paths.len());
        let mut total = 0u64;
        for path in &paths {
            let length = segment_size(path)?;
            debug!(?path, start = total, length, "Adding segment");
            segments.push(Segment {
                path: path.clone(),
                start: total,
                length,
            });
            total += length;
        }
        Ok(Self {
            segments,
            pool: FileIoPool::new(paths, max_open),
        })
    }

    fn total_size(&self) -> u64 {
        self.segments.last().map_or(0, Segment::end)
    }

    /// Index of the segment holding `pos`, or `None` at or past the end
    fn find_offset(&self, pos: u64) -> Option<usize> {
        let idx = self.segments.partition_point(|s| s.end() <= pos);
        self.segments
            .get(idx)
            .filter(|s| s.contains(pos))
            .map(|_| idx)
    }

    /// Read across segment boundaries.
    ///
    /// Each step reads from the segment owning the current position and then
    /// continues from `offset + bytes_read`, which lies in the same or a later
    /// segment, so the loop is bounded by the segment count and the data size.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            let pos = offset + filled as u64;
            let Some(idx) = self.find_offset(pos) else {
                break;
            };
            let segment = &self.segments[idx];
            let within = pos - segment.start;
            let want = (buf.len() - filled).min((segment.length - within) as usize);

            let file = self
                .pool
                .get_file(idx)
                .map_err(|e| ImageError::read(pos, e))?;
            let n = read_at(&file, &mut buf[filled..filled + want], within)
                .map_err(|e| ImageError::read(pos, e))?;
            if n == 0 {
                // The part shrank after open
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Size of one part; zero-sized device nodes are probed
fn segment_size(path: &Path) -> Result<u64> {
    let file = File::open(path)
        .map_err(|e| ImageError::no_such_file(path, format!("cannot open: {e}")))?;
    let len = fs::metadata(path)
        .map_err(|e| ImageError::no_such_file(path, format!("cannot stat: {e}")))?
        .len();
    if len > 0 {
        return Ok(len);
    }
    debug!(?path, "Zero reported size, probing device");
    probe::get_filesize(&file)
}

// =============================================================================
// Raw Backend
// =============================================================================

pub struct RawBackend {
    path: PathBuf,
    config: ImageConfig,
    index: Option<SplitFileIndex>,
}

impl RawBackend {
    pub fn new(path: impl Into<PathBuf>, config: ImageConfig) -> Self {
        Self {
            path: path.into(),
            config,
            index: None,
        }
    }

    fn geometry(&self) -> ByteGeometry {
        ByteGeometry {
            size: self.size(),
            page_size: self.config.page_size,
            margin: self.config.margin,
        }
    }

    /// Owning segment of `pos`, if any
    pub fn find_offset(&self, pos: u64) -> Option<&Segment> {
        let index = self.index.as_ref()?;
        index.find_offset(pos).map(|i| &index.segments[i])
    }

    /// Number of physical handles currently cached
    pub fn open_handle_count(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.pool.open_count())
    }
}

impl ImageBackend for RawBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Raw
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let mut paths = vec![self.path.clone()];
        if is_multipart_file(&self.path) {
            if let Some(template) = SplitTemplate::from_path(&self.path) {
                debug!(next = template.next_index(), "Probing split image parts");
                paths.extend(template.probe());
            }
        }

        let index = SplitFileIndex::build(paths, self.config.max_open_files)?;
        info!(
            path = ?self.path,
            segments = index.segments.len(),
            size = index.total_size(),
            "Opened raw image"
        );
        self.index = Some(index);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.index.as_ref().map_or(0, SplitFileIndex::total_size)
    }

    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(index) = self.index.as_ref() else {
            return Ok(0);
        };
        index.read(offset, buf).inspect_err(|err| {
            report_read_error(self.config.report_read_errors, err);
        })
    }

    fn begin(&self) -> Cursor {
        self.geometry().begin()
    }

    fn end(&self) -> Cursor {
        self.geometry().end()
    }

    fn advance(&self, cursor: &mut Cursor) {
        self.geometry().advance(cursor)
    }

    fn seek_block(&self, cursor: &mut Cursor, block: u64) -> u64 {
        self.geometry().seek_block(cursor, block)
    }

    fn max_blocks(&self) -> u64 {
        self.geometry().max_blocks()
    }

    fn fraction_done(&self, cursor: &Cursor) -> f64 {
        self.geometry().fraction_done(cursor)
    }

    fn describe(&self, cursor: &Cursor) -> String {
        self.geometry().describe(cursor)
    }

    fn position_of(&self, cursor: &Cursor) -> PositionDescriptor {
        self.geometry().position_of(cursor)
    }

    fn page_at(&self, cursor: &Cursor) -> Result<Option<Page>> {
        self.geometry()
            .read_page(cursor, |offset, buf| self.pread(offset, buf))
    }

    fn segments(&self) -> Vec<SegmentInfo> {
        self.index
            .as_ref()
            .map(|index| {
                index
                    .segments
                    .iter()
                    .map(|s| SegmentInfo {
                        path: s.path.to_string_lossy().to_string(),
                        start: s.start,
                        length: s.length,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
