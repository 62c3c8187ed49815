// Shared File I/O Pool for segment file handles
//
// Split raw images and multi-part containers can consist of hundreds of
// physical files. The pool opens them lazily, keeps at most `max_open` of them
// open and evicts the least recently used one when the limit is reached.
// Handles are `Arc<File>` so callers read outside the pool lock.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

#[derive(Default)]
struct PoolState {
    /// Currently open file handles (file_index -> File)
    open_handles: HashMap<usize, Arc<File>>,
    /// Most recently used at the front
    lru_queue: VecDeque<usize>,
}

/// Lock-guarded LRU cache of file handles keyed by file index
pub struct FileIoPool {
    /// Paths to all segment files in order
    file_paths: Vec<PathBuf>,
    max_open: usize,
    state: Mutex<PoolState>,
}

impl FileIoPool {
    pub fn new(file_paths: Vec<PathBuf>, max_open: usize) -> Self {
        Self {
            file_paths,
            max_open: max_open.max(1),
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Get a handle, opening it if necessary
    pub fn get_file(&self, file_index: usize) -> io::Result<Arc<File>> {
        let path = self.file_paths.get(file_index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "file index {} out of range (have {} files)",
                    file_index,
                    self.file_paths.len()
                ),
            )
        })?;

        let mut state = self.state.lock();

        if let Some(file) = state.open_handles.get(&file_index).cloned() {
            state.lru_queue.retain(|&x| x != file_index);
            state.lru_queue.push_front(file_index);
            trace!(file_index, "File handle cache hit");
            return Ok(file);
        }

        if state.open_handles.len() >= self.max_open {
            if let Some(lru_index) = state.lru_queue.pop_back() {
                trace!(lru_index, "Evicting LRU file handle");
                state.open_handles.remove(&lru_index);
            }
        }

        debug!(file_index, ?path, "Opening file handle");
        let file = Arc::new(File::open(path)?);
        state.open_handles.insert(file_index, Arc::clone(&file));
        state.lru_queue.push_front(file_index);
        Ok(file)
    }

    pub fn file_count(&self) -> usize {
        self.file_paths.len()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_handles.len()
    }
}
