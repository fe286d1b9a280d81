use crate::document::SnapshotDocument;
use crate::error::{Result, SnapshotError};
use crate::search::{context_window, search_document, ContextWindow, SearchOptions, SearchPage};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

pub const DEFAULT_CACHE_CAPACITY: usize = 8;

struct CachedDocument {
    modified: SystemTime,
    document: Arc<SnapshotDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub parses: u64,
}

/// Capacity-bounded LRU of parsed snapshots keyed by canonical path.
///
/// `load` hands out `Arc` handles: a caller keeps operating on the
/// point-in-time document it received even if the entry is invalidated or
/// re-parsed afterwards. The entry lock is never held across file I/O;
/// concurrent misses on one path wait on a per-path guard so only one of
/// them reads and parses.
pub struct DocumentCache {
    entries: Mutex<LruCache<PathBuf, CachedDocument>>,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    parses: AtomicU64,
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            capacity,
            hits: AtomicU64::new(0),
            parses: AtomicU64::new(0),
        }
    }

    /// Return the cached document, re-parsing only when the file's
    /// modification time differs from the stored one.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<SnapshotDocument>> {
        let key = std::fs::canonicalize(path.as_ref())?;
        let modified = std::fs::metadata(&key)?.modified()?;

        if let Some(document) = self.cached(&key, modified) {
            return Ok(document);
        }

        let guard = self.load_guard(&key);
        let _loading = guard.lock().unwrap_or_else(PoisonError::into_inner);
        // another loader may have finished while this one waited
        let result = match self.cached(&key, modified) {
            Some(document) => Ok(document),
            None => self.parse_and_insert(key.clone(), modified),
        };
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        result
    }

    fn cached(&self, key: &Path, modified: SystemTime) -> Option<Arc<SnapshotDocument>> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.modified == modified {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.document.clone());
        }
        log::debug!("Snapshot {} changed on disk, re-parsing", key.display());
        None
    }

    fn load_guard(&self, key: &Path) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_path_buf())
            .or_default()
            .clone()
    }

    fn parse_and_insert(&self, key: PathBuf, modified: SystemTime) -> Result<Arc<SnapshotDocument>> {
        let text = std::fs::read_to_string(&key).map_err(|err| {
            if err.kind() == std::io::ErrorKind::InvalidData {
                SnapshotError::ParseError(key.display().to_string())
            } else {
                SnapshotError::IoError(err)
            }
        })?;
        let document = Arc::new(SnapshotDocument::parse(key.clone(), modified, &text));
        self.parses.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Loaded snapshot {}: {} lines, {} files",
            key.display(),
            document.lines().len(),
            document.file_count()
        );

        let evicted = self.lock().push(
            key.clone(),
            CachedDocument {
                modified,
                document: document.clone(),
            },
        );
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                log::debug!("Evicted snapshot {} from cache", evicted_key.display());
            }
        }

        Ok(document)
    }

    /// Drop the entry for `path` immediately. Returns whether one existed.
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let removed = self.lock().pop(&key).is_some();
        if removed {
            log::debug!("Invalidated snapshot {}", key.display());
        }
        removed
    }

    pub fn search(
        &self,
        path: impl AsRef<Path>,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<SearchPage> {
        let document = self.load(path)?;
        search_document(&document, pattern, options)
    }

    pub fn get_context(
        &self,
        path: impl AsRef<Path>,
        file: &str,
        line: usize,
        before: usize,
        after: usize,
    ) -> Result<ContextWindow> {
        let document = self.load(path)?;
        context_window(&document, file, line, before, after)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.lock().contains(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity.get(),
            hits: self.hits.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<PathBuf, CachedDocument>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
