// Evidence container backend (.E01 and friends)
// Paging over the decoded media of a container served by an opaque codec

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{report_read_error, BackendKind, ByteGeometry, ImageBackend};
use crate::codec::parts::enumerate_container_parts;
use crate::codec::{ContainerCodec, ContainerReader, HeaderField};
use crate::config::ImageConfig;
use crate::cursor::Cursor;
use crate::error::{ImageError, ReadErrorKind, Result};
use crate::page::{Page, PositionDescriptor};

pub struct ContainerBackend {
    path: PathBuf,
    config: ImageConfig,
    codec: Arc<dyn ContainerCodec>,
    reader: Option<Box<dyn ContainerReader>>,
    parts: Vec<PathBuf>,
    details: Vec<String>,
}

impl ContainerBackend {
    pub fn new(path: impl Into<PathBuf>, config: ImageConfig, codec: Arc<dyn ContainerCodec>) -> Self {
        Self {
            path: path.into(),
            config,
            codec,
            reader: None,
            parts: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Part files the codec opened
    pub fn parts(&self) -> &[PathBuf] {
        &self.parts
    }

    fn geometry(&self) -> ByteGeometry {
        ByteGeometry {
            size: self.size(),
            page_size: self.config.page_size,
            margin: self.config.margin,
        }
    }
}

impl fmt::Debug for ContainerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBackend")
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .field("open", &self.reader.is_some())
            .field("parts", &self.parts.len())
            .finish()
    }
}

/// "LABEL: value" lines for every non-empty header field, in harvest order
fn harvest_details(reader: &dyn ContainerReader) -> Vec<String> {
    HeaderField::ALL
        .iter()
        .filter_map(|field| {
            let value = reader.header_value(*field)?;
            let value = value.trim();
            (!value.is_empty()).then(|| format!("{}: {}", field.label(), value))
        })
        .collect()
}

impl ImageBackend for ContainerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Container
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let parts = enumerate_container_parts(self.codec.as_ref(), &self.path)
            .map_err(|e| ImageError::no_such_file(&self.path, format!("cannot list parts: {e}")))?;
        for (i, part) in parts.iter().enumerate() {
            debug!(part = i, path = ?part, "Container part");
        }
        let reader = self
            .codec
            .open(&parts)
            .map_err(|e| ImageError::no_such_file(&self.path, format!("{} open failed: {e}", self.codec.name())))?;

        self.details = harvest_details(reader.as_ref());
        info!(
            path = ?self.path,
            codec = self.codec.name(),
            parts = parts.len(),
            size = reader.media_size(),
            "Opened container image"
        );
        self.parts = parts;
        self.reader = Some(reader);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.reader.as_ref().map_or(0, |r| r.media_size())
    }

    fn pread(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(0);
        };
        let size = reader.media_size();
        if offset >= size {
            return Ok(0);
        }
        let len = buf.len().min((size - offset) as usize);
        reader.read_random(&mut buf[..len], offset).map_err(|e| {
            let err = ImageError::read(offset, ReadErrorKind::Codec(e.to_string()));
            report_read_error(self.config.report_read_errors, &err);
            err
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

    fn details(&self) -> &[String] {
        &self.details
    }
}
