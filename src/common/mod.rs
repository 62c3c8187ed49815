// Common utilities shared across backends and codecs

pub mod io_pool;
pub mod positioned;
pub mod segments;

// Re-exports for convenience
pub use io_pool::FileIoPool;
pub use positioned::{read_at, read_full_at};
pub use segments::{is_multipart_file, SplitTemplate};
