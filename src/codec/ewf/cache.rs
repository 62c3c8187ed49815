//! LRU Chunk Cache for the EWF reader (like libfcache)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Chunk cache with LRU eviction.
/// Entries are shared as `Arc` so a hit never copies chunk data.
pub(crate) struct ChunkCache {
    cache: HashMap<usize, Arc<Vec<u8>>>,
    lru_queue: VecDeque<usize>,
    max_entries: usize,
}

impl ChunkCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: HashMap::new(),
            lru_queue: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&mut self, chunk_index: usize) -> Option<Arc<Vec<u8>>> {
        let data = self.cache.get(&chunk_index)?;
        let data = Arc::clone(data);
        self.lru_queue.retain(|&x| x != chunk_index);
        self.lru_queue.push_front(chunk_index);
        Some(data)
    }

    pub fn insert(&mut self, chunk_index: usize, data: Arc<Vec<u8>>) {
        if self.cache.contains_key(&chunk_index) {
            return;
        }
        if self.cache.len() >= self.max_entries {
            if let Some(old_index) = self.lru_queue.pop_back() {
                self.cache.remove(&old_index);
            }
        }
        self.cache.insert(chunk_index, data);
        self.lru_queue.push_front(chunk_index);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_eviction() {
        let mut cache = ChunkCache::new(2);
        cache.insert(0, Arc::new(vec![0]));
        cache.insert(1, Arc::new(vec![1]));
        assert!(cache.get(0).is_some());
        cache.insert(2, Arc::new(vec![2]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(0).unwrap().as_slice(), &[0]);
        assert_eq!(cache.get(2).unwrap().as_slice(), &[2]);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let mut cache = ChunkCache::new(4);
        cache.insert(7, Arc::new(vec![1]));
        cache.insert(7, Arc::new(vec![2]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(7).unwrap().as_slice(), &[1]);
    }
}
