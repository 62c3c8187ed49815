// Split image naming: multi-part raw files and EWF part extensions
//
// Handles the naming schemes the backends have to follow:
// - Numbered raw parts: image.000 / image.001, then .002, .003, ...
// - VMware split disks: disk-s001.vmdk, then disk-s002.vmdk, ...
// - EWF parts: .E01 ... .E99, then .EAA ... .EZZ, .FAA ...

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

/// Suffixes that mark the first part of a split raw image
const MULTIPART_SUFFIXES: &[&str] = &[".000", ".001", "001.vmdk"];

// =============================================================================
// Numbered Raw Parts (.000, .001, 001.vmdk)
// =============================================================================

/// True if `path` names the first part of a split raw image
pub fn is_multipart_file(path: &Path) -> bool {
    let name = path.to_string_lossy();
    MULTIPART_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Name generator for the parts of a split raw image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTemplate {
    prefix: String,
    suffix: String,
    /// Number of the first part not yet known to exist
    next: u32,
}

impl SplitTemplate {
    /// Build the template from the first part's name.
    ///
    /// The three digits of the part number are replaced with a placeholder;
    /// probing starts at the matched number + 1.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.to_string_lossy();
        let suffix = MULTIPART_SUFFIXES
            .iter()
            .find(|suffix| name.ends_with(*suffix))?;

        // Digits sit at the start of the matched suffix, after the dot if any
        let digits_start = name.len() - suffix.len() + usize::from(suffix.starts_with('.'));
        let digits = &name[digits_start..digits_start + 3];
        let number: u32 = digits.parse().ok()?;

        Some(Self {
            prefix: name[..digits_start].to_string(),
            suffix: name[digits_start + 3..].to_string(),
            next: number + 1,
        })
    }

    pub fn next_index(&self) -> u32 {
        self.next
    }

    /// Path of part `number`, zero-padded to three digits
    pub fn path_for(&self, number: u32) -> PathBuf {
        PathBuf::from(format!("{}{:03}{}", self.prefix, number, self.suffix))
    }

    /// Probe successive part names, stopping at the first one that is
    /// missing or unreadable
    pub fn probe(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for number in self.next.. {
            let candidate = self.path_for(number);
            if File::open(&candidate).is_err() {
                trace!(?candidate, "Split sequence ends");
                break;
            }
            found.push(candidate);
        }
        debug!(count = found.len(), "Additional split parts discovered");
        found
    }
}

// =============================================================================
// EWF Part Extensions (.E01 ... .E99, .EAA ... .ZZZ)
// =============================================================================

/// Extension of EWF part `number` (1-based), preserving the case of `first_ext`.
///
/// Returns `None` once the naming scheme runs out.
pub fn ewf_part_extension(first_ext: &str, number: u32) -> Option<String> {
    let lead = first_ext.chars().next()?;
    let upper = lead.is_ascii_uppercase();
    let lead = lead.to_ascii_uppercase();
    if !lead.is_ascii_uppercase() || number == 0 {
        return None;
    }

    let ext = if number <= 99 {
        format!("{}{:02}", lead, number)
    } else {
        let value = (lead as u32 - 'A' as u32) * 26 * 26 + (number - 100);
        if value >= 26 * 26 * 26 {
            return None;
        }
        let letter = |v: u32| char::from(b'A' + v as u8);
        format!(
            "{}{}{}",
            letter(value / (26 * 26)),
            letter((value / 26) % 26),
            letter(value % 26)
        )
    };

    Some(if upper { ext } else { ext.to_ascii_lowercase() })
}

/// Discover EWF parts starting from the first one, stopping at the first gap
pub fn discover_ewf_parts(first: &Path) -> Vec<PathBuf> {
    let ext = first
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut parts = vec![first.to_path_buf()];

    for number in 2.. {
        let Some(next_ext) = ewf_part_extension(&ext, number) else {
            break;
        };
        let candidate = first.with_extension(next_ext);
        if !candidate.is_file() {
            break;
        }
        trace!(segment = number, ?candidate, "Found EWF part");
        parts.push(candidate);
    }

    debug!(part_count = parts.len(), "EWF parts discovered");
    parts
}

/// Extension of `path` after the last dot, or empty
pub fn filename_extension(path: &Path) -> String {
    let name = path.to_string_lossy();
    match name.rfind('.') {
        Some(dot) => name[dot + 1..].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_multipart_file() {
        assert!(is_multipart_file(Path::new("/cases/eraser.000")));
        assert!(is_multipart_file(Path::new("/cases/eraser.001")));
        assert!(is_multipart_file(Path::new("/vm/disk-s001.vmdk")));
        assert!(!is_multipart_file(Path::new("/cases/eraser.002")));
        assert!(!is_multipart_file(Path::new("/cases/eraser.dd")));
        assert!(!is_multipart_file(Path::new("/vm/disk-s002.vmdk")));
    }

    #[test]
    fn test_template_from_zero_part() {
        let template = SplitTemplate::from_path(Path::new("eraser.000")).unwrap();
        assert_eq!(template.next_index(), 1);
        assert_eq!(template.path_for(1), PathBuf::from("eraser.001"));
        assert_eq!(template.path_for(12), PathBuf::from("eraser.012"));
    }

    #[test]
    fn test_template_from_vmdk() {
        let template = SplitTemplate::from_path(Path::new("/vm/disk-s001.vmdk")).unwrap();
        assert_eq!(template.next_index(), 2);
        assert_eq!(template.path_for(2), PathBuf::from("/vm/disk-s002.vmdk"));
        assert!(SplitTemplate::from_path(Path::new("disk.raw")).is_none());
    }

    #[test]
    fn test_template_digits_in_directory_name() {
        let template = SplitTemplate::from_path(Path::new("/case2000/img.001")).unwrap();
        assert_eq!(template.path_for(2), PathBuf::from("/case2000/img.002"));
    }

    #[test]
    fn test_probe_stops_at_gap() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["eraser.000", "eraser.001", "eraser.002", "eraser.004"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let template = SplitTemplate::from_path(&dir.path().join("eraser.000")).unwrap();
        let found = template.probe();
        assert_eq!(
            found,
            vec![dir.path().join("eraser.001"), dir.path().join("eraser.002")]
        );
    }

    #[test]
    fn test_ewf_part_extension() {
        assert_eq!(ewf_part_extension("E01", 1).as_deref(), Some("E01"));
        assert_eq!(ewf_part_extension("E01", 2).as_deref(), Some("E02"));
        assert_eq!(ewf_part_extension("E01", 99).as_deref(), Some("E99"));
        assert_eq!(ewf_part_extension("E01", 100).as_deref(), Some("EAA"));
        assert_eq!(ewf_part_extension("E01", 101).as_deref(), Some("EAB"));
        assert_eq!(ewf_part_extension("E01", 126).as_deref(), Some("EBA"));
        assert_eq!(ewf_part_extension("E01", 100 + 676).as_deref(), Some("FAA"));
        assert_eq!(ewf_part_extension("e01", 3).as_deref(), Some("e03"));
        assert_eq!(ewf_part_extension("e01", 100).as_deref(), Some("eaa"));
        assert_eq!(ewf_part_extension("", 2), None);
    }

    #[test]
    fn test_discover_ewf_parts() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["case.E01", "case.E02", "case.E03", "case.E05"] {
            std::fs::write(dir.path().join(name), b"EVF").unwrap();
        }
        let parts = discover_ewf_parts(&dir.path().join("case.E01"));
        let names: Vec<String> = parts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["case.E01", "case.E02", "case.E03"]);
    }

    #[test]
    fn test_filename_extension() {
        assert_eq!(filename_extension(Path::new("a/b/image.E01")), "E01");
        assert_eq!(filename_extension(Path::new("noext")), "");
    }
}
