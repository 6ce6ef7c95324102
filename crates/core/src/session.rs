//! Reader cache: recently opened books' chapters, owned by the reading
//! session instead of living in global state.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::document::Chapter;

pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// Bounded LRU of chapter sets keyed by book id.
///
/// Entries are kept oldest-first; `get` moves a hit to the back and
/// `insert` evicts from the front once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct ReaderCache {
    capacity: usize,
    entries: IndexMap<String, Arc<[Chapter]>>,
}

impl Default for ReaderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ReaderCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, book_id: &str) -> bool {
        self.entries.contains_key(book_id)
    }

    /// Chapters of a cached book, marking it most recently used.
    pub fn get(&mut self, book_id: &str) -> Option<Arc<[Chapter]>> {
        let i = self.entries.get_index_of(book_id)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(i, last);
        self.entries.get_index(last).map(|(_, v)| Arc::clone(v))
    }

    /// Cache a book's chapters, returning the id of an evicted book.
    pub fn insert(&mut self, book_id: &str, chapters: impl Into<Arc<[Chapter]>>) -> Option<String> {
        if self.capacity == 0 {
            return None;
        }
        self.entries.shift_remove(book_id);
        self.entries.insert(book_id.to_string(), chapters.into());

        if self.entries.len() > self.capacity {
            let (evicted, _) = self.entries.shift_remove_index(0)?;
            tracing::debug!("Reader cache evicted {}", evicted);
            return Some(evicted);
        }
        None
    }

    pub fn remove(&mut self, book_id: &str) -> Option<Arc<[Chapter]>> {
        self.entries.shift_remove(book_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
