//! Writes small EnCase-style E01 sets for tests

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::types::{COMPRESSED_FLAG, EVF_SIGNATURE, SECTION_DESCRIPTOR_SIZE};

const BYTES_PER_SECTOR: usize = 512;

pub(crate) struct E01Options {
    pub chunks_per_segment: usize,
    pub sectors_per_chunk: u32,
    pub header: Vec<(&'static str, &'static str)>,
}

impl Default for E01Options {
    fn default() -> Self {
        Self {
            chunks_per_segment: usize::MAX,
            sectors_per_chunk: 2,
            header: vec![("c", "CASE-1"), ("n", "EV-1"), ("e", "Examiner"), ("t", "test image")],
        }
    }
}

/// Write `media` as `<stem>.E01`, `<stem>.E02`, ... in `dir`.
/// Even chunks are stored compressed and odd ones raw.
pub(crate) fn write_e01(dir: &Path, stem: &str, media: &[u8], options: &E01Options) -> Vec<PathBuf> {
    assert_eq!(media.len() % BYTES_PER_SECTOR, 0, "media must be whole sectors");
    let chunk_size = BYTES_PER_SECTOR * options.sectors_per_chunk as usize;
    let chunks: Vec<&[u8]> = media.chunks(chunk_size).collect();
    let groups: Vec<&[&[u8]]> = if chunks.is_empty() {
        vec![&[][..]]
    } else {
        chunks.chunks(options.chunks_per_segment).collect()
    };

    let mut paths = Vec::new();
    let mut first_chunk = 0;
    for (i, group) in groups.iter().enumerate() {
        let number = i + 1;
        let mut out = Vec::new();
        out.extend_from_slice(EVF_SIGNATURE);
        out.push(1);
        out.extend_from_slice(&(number as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());

        if number == 1 {
            push_section(&mut out, "header", &zlib(header_text(&options.header).as_bytes()), false);
            let volume = volume_data(chunks.len() as u32, options.sectors_per_chunk, media.len());
            push_section(&mut out, "volume", &volume, false);
        }

        let data_start = out.len() + SECTION_DESCRIPTOR_SIZE as usize;
        let mut sectors = Vec::new();
        let mut entries = Vec::new();
        for (j, chunk) in group.iter().enumerate() {
            let at = (data_start + sectors.len()) as u32;
            if (first_chunk + j) % 2 == 0 {
                sectors.extend(zlib(chunk));
                entries.push(at | COMPRESSED_FLAG);
            } else {
                sectors.extend_from_slice(chunk);
                sectors.extend_from_slice(&[0u8; 4]);
                entries.push(at);
            }
        }
        push_section(&mut out, "sectors", &sectors, false);

        let mut table = Vec::new();
        table.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        table.extend_from_slice(&[0u8; 4]);
        table.extend_from_slice(&0u64.to_le_bytes());
        table.extend_from_slice(&[0u8; 8]);
        for entry in entries {
            table.extend_from_slice(&entry.to_le_bytes());
        }
        table.extend_from_slice(&[0u8; 4]);
        push_section(&mut out, "table", &table, false);

        let last = number == groups.len();
        push_section(&mut out, if last { "done" } else { "next" }, &[], true);

        first_chunk += group.len();
        let path = dir.join(format!("{stem}.E{number:02}"));
        fs::write(&path, &out).unwrap();
        paths.push(path);
    }
    paths
}

fn push_section(out: &mut Vec<u8>, kind: &str, data: &[u8], terminal: bool) {
    let offset = out.len() as u64;
    let size = SECTION_DESCRIPTOR_SIZE + data.len() as u64;
    let next = if terminal { offset } else { offset + size };

    let mut name = [0u8; 16];
    name[..kind.len()].copy_from_slice(kind.as_bytes());
    out.extend_from_slice(&name);
    out.extend_from_slice(&next.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&[0u8; 40]);
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(data);
}

fn volume_data(chunk_count: u32, sectors_per_chunk: u32, media_len: usize) -> Vec<u8> {
    let mut data = vec![0u8; 94];
    data[0] = 1;
    data[4..8].copy_from_slice(&chunk_count.to_le_bytes());
    data[8..12].copy_from_slice(&sectors_per_chunk.to_le_bytes());
    data[12..16].copy_from_slice(&(BYTES_PER_SECTOR as u32).to_le_bytes());
    data[16..24].copy_from_slice(&((media_len / BYTES_PER_SECTOR) as u64).to_le_bytes());
    data
}

fn header_text(fields: &[(&str, &str)]) -> String {
    let keys: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
    let values: Vec<&str> = fields.iter().map(|(_, v)| *v).collect();
    format!("1\nmain\n{}\n{}\n\n", keys.join("\t"), values.join("\t"))
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
