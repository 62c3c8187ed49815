// Container part enumeration
//
// Normally the codec lists the parts itself. Acquisition tools that append
// checksums to part names ("image.E01.<md5>") defeat that, so names carrying
// the ".E01." marker go through a wildcard match over the directory instead.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use super::{CodecError, CodecResult, ContainerCodec};

/// Marker of a checksum-suffixed first part
pub const E01_INFIX: &str = ".E01.";

/// Parts of the container whose first part is `path`
pub fn enumerate_container_parts(codec: &dyn ContainerCodec, path: &Path) -> CodecResult<Vec<PathBuf>> {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let parts = if name.contains(E01_INFIX) {
        warn!(?path, "Experimental part matching for E01 names with checksums appended");
        wildcard_parts(path)?
    } else {
        codec.glob(path)?
    };
    debug!(codec = codec.name(), part_count = parts.len(), "Container parts");
    if parts.is_empty() {
        return Err(CodecError::NoParts(path.to_path_buf()));
    }
    Ok(parts)
}

/// Wildcard pattern for `name`: every character from the ".E01." marker on,
/// except dots, matches any single character
pub fn wildcard_pattern(name: &str) -> Option<String> {
    let marker = name.find(E01_INFIX)?;
    let (head, tail) = name.split_at(marker);
    let tail: String = tail.chars().map(|c| if c == '.' { '.' } else { '?' }).collect();
    Some(format!("{head}{tail}"))
}

/// Sibling files of `path` matching its wildcard pattern, sorted
pub fn wildcard_parts(path: &Path) -> CodecResult<Vec<PathBuf>> {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let pattern = wildcard_pattern(&name).ok_or_else(|| {
        CodecError::InvalidFormat(format!("cannot find {E01_INFIX} in {name}"))
    })?;
    let regex = pattern_regex(&pattern)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut parts: Vec<PathBuf> = fs::read_dir(&dir)?
        .flatten()
        .filter(|entry| regex.is_match(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    parts.sort();
    Ok(parts)
}

fn pattern_regex(pattern: &str) -> CodecResult<Regex> {
    let body: String = pattern
        .split('?')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".");
    Regex::new(&format!("^{body}$")).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}
