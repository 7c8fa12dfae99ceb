//! Decode cache memory accounting
//!
//! **Why**: Decoded float frames are large; the shared cache needs a byte
//! budget derived from the machine's available memory, not just an entry count.
//!
//! **Used by**: ImageCache (add/free on insert/evict)

use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::System;

/// Tracks bytes held by the decode cache against a limit
#[derive(Debug)]
pub struct CacheManager {
    memory_usage: AtomicUsize,
    max_memory_bytes: AtomicUsize,
}

impl CacheManager {
    /// Create manager with a limit relative to available memory
    ///
    /// # Arguments
    ///
    /// * `mem_fraction` - Fraction of available memory (0.0-1.0)
    /// * `reserve_gb` - Memory left to the system (GB)
    pub fn new(mem_fraction: f64, reserve_gb: f64) -> Self {
        let limit = Self::compute_limit(mem_fraction, reserve_gb);
        info!(
            "CacheManager init: limit={} MB ({}%)",
            limit / 1024 / 1024,
            (mem_fraction * 100.0) as u32
        );
        Self::with_limit(limit)
    }

    /// Create manager with an explicit byte limit
    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            memory_usage: AtomicUsize::new(0),
            max_memory_bytes: AtomicUsize::new(limit_bytes),
        }
    }

    fn compute_limit(mem_fraction: f64, reserve_gb: f64) -> usize {
        let mut sys = System::new();
        sys.refresh_memory();

        let available = sys.available_memory() as usize;
        let reserve = (reserve_gb * 1024.0 * 1024.0 * 1024.0) as usize;
        let usable = available.saturating_sub(reserve);
        (usable as f64 * mem_fraction.clamp(0.0, 1.0)) as usize
    }

    /// Check if memory limit exceeded
    pub fn check_memory_limit(&self) -> bool {
        self.memory_usage.load(Ordering::Relaxed) > self.max_memory_bytes.load(Ordering::Relaxed)
    }

    /// Would adding `bytes` exceed the limit?
    pub fn would_exceed(&self, bytes: usize) -> bool {
        self.memory_usage.load(Ordering::Relaxed) + bytes > self.max_memory_bytes.load(Ordering::Relaxed)
    }

    /// Get memory statistics (usage, limit)
    pub fn mem(&self) -> (usize, usize) {
        (
            self.memory_usage.load(Ordering::Relaxed),
            self.max_memory_bytes.load(Ordering::Relaxed),
        )
    }

    pub fn add_memory(&self, bytes: usize) {
        let new_usage = self.memory_usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let limit = self.max_memory_bytes.load(Ordering::Relaxed);
        if new_usage > limit {
            debug!(
                "Memory limit exceeded: {} MB / {} MB",
                new_usage / 1024 / 1024,
                limit / 1024 / 1024
            );
        }
    }

    /// Free memory usage (saturating)
    pub fn free_memory(&self, bytes: usize) {
        let _ = self
            .memory_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    /// Update memory limit (e.g. from settings)
    pub fn set_memory_limit(&self, mem_fraction: f64, reserve_gb: f64) {
        let new_limit = Self::compute_limit(mem_fraction, reserve_gb);
        self.max_memory_bytes.store(new_limit, Ordering::Relaxed);
        info!(
            "Memory limit updated: {} MB ({}%)",
            new_limit / 1024 / 1024,
            (mem_fraction * 100.0) as u32
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tracking() {
        let manager = CacheManager::with_limit(1024 * 1024);

        manager.add_memory(512 * 1024);
        assert_eq!(manager.mem().0, 512 * 1024);
        assert!(!manager.check_memory_limit());
        assert!(manager.would_exceed(600 * 1024));

        manager.free_memory(1024 * 1024 * 8);
        assert_eq!(manager.mem().0, 0);
    }

    #[test]
    fn test_limit_from_system() {
        let manager = CacheManager::new(0.5, 0.0);
        let (usage, _limit) = manager.mem();
        assert_eq!(usage, 0);
    }
}
