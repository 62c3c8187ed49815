//! Paging configuration passed to the factory at construction time

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};

/// 16 MiB, the nominal page handed to scanners
pub const DEFAULT_PAGE_SIZE: usize = 16 * 1024 * 1024;
/// 4 MiB of trailing overlap
pub const DEFAULT_MARGIN: usize = 4 * 1024 * 1024;
/// Maximum number of simultaneously open segment files
pub const DEFAULT_MAX_OPEN_FILES: usize = 32;

/// Paging and resource settings for one `ImageHandle`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Nominal page size; also the block size for `seek_block`
    pub page_size: usize,
    /// Bytes appended after each page so boundary-spanning patterns are seen
    pub margin: usize,
    /// Log mid-scan read errors as they happen
    pub report_read_errors: bool,
    /// Upper bound on physical handles kept open by the segment pool
    pub max_open_files: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            margin: DEFAULT_MARGIN,
            report_read_errors: true,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

impl ImageConfig {
    pub fn new(page_size: usize, margin: usize) -> Self {
        Self {
            page_size,
            margin,
            ..Self::default()
        }
    }

    pub fn with_report_read_errors(mut self, report: bool) -> Self {
        self.report_read_errors = report;
        self
    }

    pub fn with_max_open_files(mut self, max_open: usize) -> Self {
        self.max_open_files = max_open;
        self
    }

    /// Page size plus margin, the largest buffer a page can hold
    pub fn window(&self) -> usize {
        self.page_size.saturating_add(self.margin)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ImageError::InvalidConfig("page_size must be positive".into()));
        }
        if self.max_open_files == 0 {
            return Err(ImageError::InvalidConfig(
                "max_open_files must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ImageConfig = serde_json::from_str(json)
            .map_err(|e| ImageError::InvalidConfig(format!("malformed JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ImageError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}
