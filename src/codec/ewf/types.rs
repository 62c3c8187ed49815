//! Type definitions for EWF format parsing

// =============================================================================
// Core Constants
// =============================================================================

pub(crate) const EVF_SIGNATURE: &[u8; 8] = b"EVF\x09\x0d\x0a\xff\x00";
pub(crate) const EVF2_SIGNATURE: &[u8; 8] = b"EVF2\x0d\x0a\x81\x00";
pub(crate) const LVF_SIGNATURE: &[u8; 8] = b"LVF\x09\x0d\x0a\xff\x00";
/// Signature, fields start, segment number, fields end
pub(crate) const FILE_HEADER_SIZE: u64 = 13;
pub(crate) const SECTION_DESCRIPTOR_SIZE: u64 = 76;
/// Table header before the offset entries
pub(crate) const TABLE_HEADER_SIZE: usize = 24;
pub(crate) const COMPRESSED_FLAG: u32 = 0x8000_0000;
pub(crate) const MAX_SECTIONS: usize = 10_000;
pub(crate) const MAX_HEADER_BYTES: u64 = 1024 * 1024;
pub(crate) const MAX_OPEN_FILES: usize = 16; // Like libewf's rlimit handling
pub(crate) const CHUNK_CACHE_ENTRIES: usize = 64;

// =============================================================================
// Section Descriptors
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct SectionDescriptor {
    pub section_type: String,
    /// Where this descriptor sits in its segment file
    pub offset: u64,
    /// Offset of the next descriptor in the same segment file
    pub next_offset: u64,
    /// Section size including the descriptor
    pub size: u64,
}

impl SectionDescriptor {
    pub fn parse(raw: &[u8; SECTION_DESCRIPTOR_SIZE as usize], offset: u64) -> Self {
        let section_type = raw[..16]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Self {
            section_type,
            offset,
            next_offset: u64_at(raw, 16),
            size: u64_at(raw, 24),
        }
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + SECTION_DESCRIPTOR_SIZE
    }

    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(SECTION_DESCRIPTOR_SIZE)
    }
}

// =============================================================================
// Volume
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VolumeSection {
    pub chunk_count: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub sector_count: u64,
}

impl VolumeSection {
    pub(crate) const DATA_SIZE: usize = 24;

    pub(crate) fn parse(data: &[u8; Self::DATA_SIZE]) -> Self {
        Self {
            chunk_count: u32_at(data, 4),
            sectors_per_chunk: u32_at(data, 8),
            bytes_per_sector: u32_at(data, 12),
            sector_count: u64_at(data, 16),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.sectors_per_chunk as u64 * self.bytes_per_sector as u64
    }

    pub fn media_size(&self) -> u64 {
        self.sector_count * self.bytes_per_sector as u64
    }

    /// Decoded length of chunk `index`; the last chunk may be partial
    pub fn chunk_len(&self, index: u64) -> u64 {
        let start = index * self.chunk_size();
        self.chunk_size().min(self.media_size().saturating_sub(start))
    }
}

// =============================================================================
// Chunk Location - Maps chunks to their storage location
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChunkLocation {
    /// Part holding the chunk
    pub segment: usize,
    /// Offset of the stored chunk inside that part
    pub offset: u64,
    pub compressed: bool,
    /// Stored length when the next chunk or the section end tells us
    pub stored_len: Option<u64>,
}

pub(crate) fn u32_at(data: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn u64_at(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}
