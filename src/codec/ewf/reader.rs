//! EwfReader - random access to the media stored in an E01 set

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::codec::{CodecError, CodecResult, ContainerReader, HeaderField};
use crate::common::positioned::read_full_at;
use crate::common::FileIoPool;

use super::cache::ChunkCache;
use super::header::CaseInfo;
use super::types::*;

// =============================================================================
// EwfReader - Main Interface (like libewf_handle)
// =============================================================================

pub struct EwfReader {
    /// File I/O pool managing all segment files
    file_pool: FileIoPool,
    segment_sizes: Vec<u64>,
    /// Volume information from the first volume/disk section
    volume: VolumeSection,
    /// chunk_index -> stored location
    chunk_table: Vec<ChunkLocation>,
    case_info: CaseInfo,
    chunk_cache: Mutex<ChunkCache>,
}

/// What the section walk of one segment file contributed
#[derive(Default)]
struct SegmentWalk {
    volume: Option<VolumeSection>,
    chunks: Vec<ChunkLocation>,
    header: Option<CaseInfo>,
    header2: Option<CaseInfo>,
}

impl EwfReader {
    /// Open an E01 set from its ordered segment files
    pub fn open(segment_paths: &[PathBuf], max_open: usize) -> CodecResult<Self> {
        let first = segment_paths
            .first()
            .ok_or_else(|| CodecError::InvalidFormat("no segment files".into()))?;
        debug!(path = ?first, segment_count = segment_paths.len(), "Opening EWF set");

        let file_pool = FileIoPool::new(segment_paths.to_vec(), max_open);
        let mut segment_sizes = Vec::with_capacity(segment_paths.len());
        let mut volume: Option<VolumeSection> = None;
        let mut chunk_table = Vec::new();
        let mut case_info: Option<CaseInfo> = None;

        for index in 0..file_pool.file_count() {
            let file = file_pool.get_file(index)?;
            let size = file.metadata()?.len();
            segment_sizes.push(size);
            check_file_header(&file, index)?;

            let walk = walk_sections(&file, index, size)?;
            if volume.is_none() {
                volume = walk.volume;
            }
            chunk_table.extend(walk.chunks);
            // header2 carries the same table as header, in UTF-16
            if case_info.is_none() {
                case_info = walk.header2.or(walk.header);
            }
        }

        let volume = volume.ok_or_else(|| CodecError::InvalidFormat("no volume section found".into()))?;
        if volume.chunk_size() == 0 {
            return Err(CodecError::InvalidFormat("volume declares zero-sized chunks".into()));
        }
        if chunk_table.len() > volume.chunk_count as usize {
            chunk_table.truncate(volume.chunk_count as usize);
        }
        debug!(
            media_size = volume.media_size(),
            chunk_size = volume.chunk_size(),
            chunks = chunk_table.len(),
            "EWF set opened"
        );

        Ok(Self {
            file_pool,
            segment_sizes,
            volume,
            chunk_table,
            case_info: case_info.unwrap_or_default(),
            chunk_cache: Mutex::new(ChunkCache::new(CHUNK_CACHE_ENTRIES)),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_table.len()
    }

    /// Decoded chunk `index`, from the cache when possible
    fn read_chunk(&self, index: usize) -> CodecResult<Arc<Vec<u8>>> {
        if let Some(hit) = self.chunk_cache.lock().get(index) {
            return Ok(hit);
        }

        let expected = self.volume.chunk_len(index as u64) as usize;
        // A table shorter than the volume means the acquisition stopped early
        let location = self.chunk_table.get(index).ok_or_else(|| {
            CodecError::InvalidFormat(format!(
                "chunk {index} missing from table ({} of {} chunks present)",
                self.chunk_table.len(),
                self.volume.chunk_count
            ))
        })?;
        let data = self.decode_chunk(index, location, expected)?;

        let data = Arc::new(data);
        self.chunk_cache.lock().insert(index, Arc::clone(&data));
        Ok(data)
    }

    fn decode_chunk(&self, index: usize, location: &ChunkLocation, expected: usize) -> CodecResult<Vec<u8>> {
        let file = self.file_pool.get_file(location.segment)?;
        let segment_size = self.segment_sizes[location.segment];
        if location.offset >= segment_size {
            return Err(CodecError::OutOfBounds {
                offset: location.offset,
                size: segment_size,
            });
        }
        let available = segment_size - location.offset;

        if !location.compressed {
            let mut data = vec![0u8; expected];
            let n = read_full_at(&file, &mut data, location.offset)?;
            if n < expected {
                return Err(CodecError::InvalidFormat(format!(
                    "chunk {index} truncated: {n} of {expected} bytes"
                )));
            }
            return Ok(data);
        }

        let stored = location
            .stored_len
            .unwrap_or(self.volume.chunk_size() * 2)
            .min(available) as usize;
        let mut compressed = vec![0u8; stored];
        let n = read_full_at(&file, &mut compressed, location.offset)?;
        compressed.truncate(n);

        let mut data = Vec::with_capacity(expected);
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut data)
            .map_err(|e| CodecError::InvalidFormat(format!("chunk {index} failed to inflate: {e}")))?;
        if data.len() < expected {
            return Err(CodecError::InvalidFormat(format!(
                "chunk {index} inflated to {} of {expected} bytes",
                data.len()
            )));
        }
        data.truncate(expected);
        trace!(index, stored = n, "Inflated chunk");
        Ok(data)
    }
}

impl ContainerReader for EwfReader {
    fn media_size(&self) -> u64 {
        self.volume.media_size()
    }

    fn read_random(&self, buf: &mut [u8], offset: u64) -> CodecResult<usize> {
        let media_size = self.media_size();
        if offset >= media_size {
            return Ok(0);
        }
        let wanted = buf.len().min((media_size - offset) as usize);
        let chunk_size = self.volume.chunk_size();

        let mut filled = 0usize;
        while filled < wanted {
            let pos = offset + filled as u64;
            let index = (pos / chunk_size) as usize;
            let within = (pos % chunk_size) as usize;

            let chunk = self.read_chunk(index)?;
            if within >= chunk.len() {
                break;
            }
            let n = (wanted - filled).min(chunk.len() - within);
            buf[filled..filled + n].copy_from_slice(&chunk[within..within + n]);
            filled += n;
        }
        Ok(filled)
    }

    fn header_value(&self, field: HeaderField) -> Option<String> {
        self.case_info.get(field).map(str::to_string)
    }
}

// =============================================================================
// Section walk
// =============================================================================

fn check_file_header(file: &File, index: usize) -> CodecResult<()> {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    let n = read_full_at(file, &mut header, 0)?;
    if n < header.len() {
        return Err(CodecError::InvalidFormat(format!("segment {} is too small", index + 1)));
    }
    let signature = &header[..8];
    if signature == EVF2_SIGNATURE {
        return Err(CodecError::InvalidFormat("EWF version 2 (Ex01) is not supported".into()));
    }
    if signature == LVF_SIGNATURE {
        return Err(CodecError::InvalidFormat("logical evidence files (L01) hold no media".into()));
    }
    if signature != EVF_SIGNATURE {
        return Err(CodecError::InvalidFormat(format!("segment {} has no EVF signature", index + 1)));
    }
    let number = u16::from_le_bytes([header[9], header[10]]);
    if number as usize != index + 1 {
        debug!(expected = index + 1, found = number, "Segment number out of sequence");
    }
    Ok(())
}

/// Follow the descriptor chain of one segment file. Offsets are relative to
/// the start of that file.
fn walk_sections(file: &File, index: usize, file_size: u64) -> CodecResult<SegmentWalk> {
    let mut walk = SegmentWalk::default();
    let mut offset = FILE_HEADER_SIZE;
    // End of the latest sectors section bounds the last chunk of a table
    let mut sectors_end: Option<u64> = None;

    for _ in 0..MAX_SECTIONS {
        if offset + SECTION_DESCRIPTOR_SIZE > file_size {
            trace!(segment = index, offset, "Descriptor chain runs past end of segment");
            break;
        }
        let mut raw = [0u8; SECTION_DESCRIPTOR_SIZE as usize];
        read_full_at(file, &mut raw, offset)?;
        let section = SectionDescriptor::parse(&raw, offset);
        trace!(segment = index, offset, kind = %section.section_type, size = section.size, "Section");

        match section.section_type.as_str() {
            "header2" | "header" => {
                let len = section.data_size().min(MAX_HEADER_BYTES) as usize;
                let mut data = vec![0u8; len];
                let n = read_full_at(file, &mut data, section.data_offset())?;
                data.truncate(n);
                if section.section_type == "header2" {
                    walk.header2.get_or_insert_with(|| CaseInfo::decode(&data, true));
                } else {
                    walk.header.get_or_insert_with(|| CaseInfo::decode(&data, false));
                }
            }
            "volume" | "disk" => {
                if walk.volume.is_none() {
                    let mut data = [0u8; VolumeSection::DATA_SIZE];
                    let n = read_full_at(file, &mut data, section.data_offset())?;
                    if n < data.len() {
                        return Err(CodecError::InvalidFormat("volume section truncated".into()));
                    }
                    walk.volume = Some(VolumeSection::parse(&data));
                }
            }
            "sectors" => {
                sectors_end = Some(section.offset + section.size);
            }
            "table" => {
                walk.chunks.extend(read_table(file, index, &section, sectors_end)?);
            }
            "next" | "done" => break,
            _ => {}
        }

        if section.next_offset <= offset {
            break;
        }
        offset = section.next_offset;
    }

    Ok(walk)
}

fn read_table(
    file: &File,
    segment: usize,
    section: &SectionDescriptor,
    sectors_end: Option<u64>,
) -> CodecResult<Vec<ChunkLocation>> {
    let mut header = [0u8; TABLE_HEADER_SIZE];
    let n = read_full_at(file, &mut header, section.data_offset())?;
    if n < TABLE_HEADER_SIZE {
        return Err(CodecError::InvalidFormat("table section truncated".into()));
    }
    let count = u32_at(&header, 0) as usize;
    let base = u64_at(&header, 8);

    let room = section.data_size().saturating_sub(TABLE_HEADER_SIZE as u64) / 4;
    let count = count.min(room as usize);
    let mut raw = vec![0u8; count * 4];
    let n = read_full_at(file, &mut raw, section.data_offset() + TABLE_HEADER_SIZE as u64)?;
    raw.truncate(n - n % 4);

    let mut chunks: Vec<ChunkLocation> = raw
        .chunks_exact(4)
        .map(|entry| {
            let value = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
            ChunkLocation {
                segment,
                offset: base + (value & !COMPRESSED_FLAG) as u64,
                compressed: value & COMPRESSED_FLAG != 0,
                stored_len: None,
            }
        })
        .collect();

    for i in 0..chunks.len() {
        let end = match chunks.get(i + 1) {
            Some(next) => Some(next.offset),
            None => sectors_end,
        };
        chunks[i].stored_len = end
            .filter(|&end| end > chunks[i].offset)
            .map(|end| end - chunks[i].offset);
    }
    Ok(chunks)
}
