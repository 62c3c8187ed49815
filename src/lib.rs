//! imgpager - paged, overlapping access to forensic disk images
//!
//! Presents raw images (single files, devices, `.000`/`.001` splits), evidence
//! containers (E01) and directory trees as one stream of pages. Every page is
//! `page_size` bytes plus a `margin` of overlap so a pattern straddling a page
//! boundary is still seen whole.
//!
//! ```no_run
//! let image = imgpager::open("/cases/eraser.000", false, 16 << 20, 4 << 20)?;
//! for page in image.pages() {
//!     let page = page?;
//!     println!("{} {}", page.position(), page.active_len());
//! }
//! # Ok::<(), imgpager::ImageError>(())
//! ```

pub mod backend;
pub mod codec;
pub mod common;
pub mod config;
pub mod cursor;
pub mod error;
pub mod image;
pub mod logging;
pub mod page;
pub mod probe;

use std::path::Path;

pub use backend::{BackendKind, ImageBackend, SegmentInfo};
pub use config::ImageConfig;
pub use cursor::{Cursor, CursorPosition};
pub use error::{ImageError, ReadErrorKind, Result};
pub use image::{ImageHandle, ImageInfo, PageIter};
pub use page::{Page, PositionDescriptor};
pub use probe::get_filesize;

/// Open an image with the built-in codec and default settings apart from
/// the page geometry
pub fn open(
    path: impl AsRef<Path>,
    allow_directory_recursion: bool,
    page_size: usize,
    margin: usize,
) -> Result<ImageHandle> {
    ImageHandle::open(path, allow_directory_recursion, ImageConfig::new(page_size, margin))
}
