//! Polling file watcher for sequence sources
//!
//! **Why**: Images regenerated on disk (render output, simulation dumps)
//! should show up without restarting the viewer. A changed file is evicted
//! from the decode cache on the watcher thread and reported to the session,
//! which drops the materialized image of every sequence that uses it.
//!
//! **Used by**: Session::tick
//!
//! # Threading
//!
//! One named thread polls modification times every `interval`. The path set
//! is replaced through a channel; dropping the watcher signals shutdown and
//! joins the thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, trace, warn};

use crate::core::cache::ImageCache;

pub struct FileWatcher {
    paths_tx: Sender<Vec<PathBuf>>,
    events_rx: Receiver<PathBuf>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FileWatcher {
    /// Start the polling thread.
    pub fn spawn(interval: Duration, cache: Option<Arc<ImageCache>>) -> std::io::Result<Self> {
        let (paths_tx, paths_rx) = unbounded::<Vec<PathBuf>>();
        let (events_tx, events_rx) = unbounded::<PathBuf>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let interval = interval.max(Duration::from_millis(10));

        let handle = thread::Builder::new()
            .name("seqview-watcher".into())
            .spawn(move || {
                trace!("File watcher started ({:?})", interval);
                let mut stamps: HashMap<PathBuf, Option<SystemTime>> = HashMap::new();

                loop {
                    match paths_rx.recv_timeout(interval) {
                        Ok(paths) => {
                            stamps = paths
                                .into_iter()
                                .map(|p| {
                                    let stamp = modified(&p);
                                    (p, stamp)
                                })
                                .collect();
                            debug!("Watching {} file(s)", stamps.len());
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }

                    for (path, stamp) in stamps.iter_mut() {
                        let now = modified(path);
                        if now == *stamp {
                            continue;
                        }
                        *stamp = now;
                        debug!("Changed on disk: {}", path.display());
                        if let Some(cache) = &cache {
                            cache.evict(&path.to_string_lossy());
                        }
                        if events_tx.send(path.clone()).is_err() {
                            return;
                        }
                    }
                }
                trace!("File watcher stopped");
            })?;

        Ok(Self {
            paths_tx,
            events_rx,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Replace the watched path set.
    pub fn watch(&self, paths: Vec<PathBuf>) {
        if self.paths_tx.send(paths).is_err() {
            warn!("File watcher thread is gone");
        }
    }

    /// Paths changed since the last call
    pub fn drain(&self) -> Vec<PathBuf> {
        self.events_rx.try_iter().collect()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("File watcher thread panicked");
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache_man::CacheManager;
    use crate::core::image::Image;
    use std::time::Instant;

    fn wait_for_event(watcher: &FileWatcher) -> Vec<PathBuf> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = watcher.drain();
            if !events.is_empty() || Instant::now() > deadline {
                return events;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Test: Rewritten file is reported and evicted
    /// Validates: Cache entry keyed by the path is dropped
    #[test]
    fn test_change_evicts_and_reports() {
        let dir = std::env::temp_dir().join(format!("seqview_watch_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("a.txt");
        std::fs::write(&file, b"one").unwrap();

        let cache = Arc::new(ImageCache::new(8, Arc::new(CacheManager::with_limit(1 << 20))));
        let key = file.to_string_lossy().to_string();
        cache.insert(&key, Arc::new(Image::from_f32(vec![1.0], 1, 1, 1).unwrap()));

        let watcher = FileWatcher::spawn(Duration::from_millis(20), Some(cache.clone())).unwrap();
        watcher.watch(vec![file.clone()]);
        thread::sleep(Duration::from_millis(100));

        // Removing the file changes its stamp to None
        std::fs::remove_file(&file).unwrap();
        let events = wait_for_event(&watcher);
        assert_eq!(events, vec![file.clone()]);
        assert!(!cache.contains(&key));

        drop(watcher);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_drop_stops_thread() {
        let watcher = FileWatcher::spawn(Duration::from_millis(10), None).unwrap();
        watcher.watch(Vec::new());
        assert!(watcher.drain().is_empty());
        drop(watcher);
    }
}
