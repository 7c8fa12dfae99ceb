//! Shared decode cache with LRU eviction
//!
//! Key: source identifier (path or `"-"`) -> decoded `Arc<Image>`.
//! Integrated with CacheManager for memory tracking. Lookup, insert and
//! eviction all take the same mutex; decoding runs outside of it so the
//! file watcher thread never waits on a slow decode.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use lru::LruCache;

use crate::core::cache_man::CacheManager;
use crate::core::image::{Image, ImageError};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(512) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Thread-safe decode cache shared by every sequence of a session
#[derive(Debug)]
pub struct ImageCache {
    cache: Mutex<LruCache<String, Arc<Image>>>,
    cache_manager: Arc<CacheManager>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    /// Create cache with an entry capacity (0 falls back to 512)
    pub fn new(capacity: usize, manager: Arc<CacheManager>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        debug!("ImageCache created: capacity={}", capacity);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            cache_manager: manager,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<Image>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get image, updating LRU order on hit
    pub fn get(&self, id: &str) -> Option<Arc<Image>> {
        let found = self.lock().get(id).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Check presence without touching LRU order or counters
    pub fn contains(&self, id: &str) -> bool {
        self.lock().peek(id).is_some()
    }

    /// Return the cached image or decode it with `load` and insert it.
    ///
    /// If another thread inserted the same key while `load` ran, the
    /// already-cached image is kept and returned.
    pub fn get_or_load<F>(&self, id: &str, load: F) -> Result<Arc<Image>, ImageError>
    where
        F: FnOnce() -> Result<Image, ImageError>,
    {
        if let Some(image) = self.get(id) {
            return Ok(image);
        }
        let image = Arc::new(load()?);
        Ok(self.insert(id, image))
    }

    /// Insert with LRU eviction, returning the image now stored under `id`
    pub fn insert(&self, id: &str, image: Arc<Image>) -> Arc<Image> {
        let size = image.mem();
        let mut cache = self.lock();

        if let Some(existing) = cache.get(id) {
            return Arc::clone(existing);
        }

        while self.cache_manager.would_exceed(size) {
            let Some((key, evicted)) = cache.pop_lru() else {
                break;
            };
            self.cache_manager.free_memory(evicted.mem());
            debug!(
                "LRU evicted {}: freed {} KB (usage: {} MB / {} MB)",
                key,
                evicted.mem() / 1024,
                self.cache_manager.mem().0 / 1024 / 1024,
                self.cache_manager.mem().1 / 1024 / 1024
            );
        }

        // Capacity overflow pushes out the LRU entry too
        if let Some((key, evicted)) = cache.push(id.to_string(), Arc::clone(&image)) {
            if key != id {
                self.cache_manager.free_memory(evicted.mem());
            }
        }
        self.cache_manager.add_memory(size);
        debug!("Cached {} ({} bytes)", id, size);
        image
    }

    /// Drop a single entry (file changed on disk)
    pub fn evict(&self, id: &str) -> bool {
        let removed = self.lock().pop(id);
        match removed {
            Some(image) => {
                self.cache_manager.free_memory(image.mem());
                debug!("Evicted {}", id);
                true
            }
            None => false,
        }
    }

    /// Drop everything
    pub fn flush(&self) {
        let mut cache = self.lock();
        for (_, image) in cache.iter() {
            self.cache_manager.free_memory(image.mem());
        }
        cache.clear();
        debug!("Flushed image cache");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.len();
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes: self.cache_manager.mem().0,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Bytes currently held
    pub bytes: usize,
}
