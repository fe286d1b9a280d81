use crate::cache::DocumentCache;
use crate::error::{Result, SnapshotError};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Evicts cached snapshots when their files change on disk.
///
/// The cache already re-parses on mtime drift; the watcher makes eviction
/// immediate so memory is released as soon as a snapshot is rewritten or
/// deleted.
pub struct SnapshotWatcher {
    watcher: Mutex<RecommendedWatcher>,
    watched: Arc<Mutex<HashSet<PathBuf>>>,
}

impl SnapshotWatcher {
    pub fn start(cache: Arc<DocumentCache>, poll_interval: Duration) -> Result<Self> {
        let watched: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
        let watched_for_events = watched.clone();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => handle_event(&cache, &watched_for_events, &event),
                Err(err) => log::warn!("Snapshot watcher error: {err}"),
            },
            NotifyConfig::default().with_poll_interval(poll_interval),
        )
        .map_err(|e| SnapshotError::WatcherError(format!("watcher init failed: {e}")))?;

        Ok(Self {
            watcher: Mutex::new(watcher),
            watched,
        })
    }

    /// Watch the directory holding `path` and react to events for that file.
    ///
    /// Tools that save by writing a temp file and renaming it over the
    /// snapshot replace the inode, so the watch sits on the parent directory.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = canonical_snapshot_path(path.as_ref())?;
        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            return Err(SnapshotError::WatcherError(format!(
                "snapshot {} has no parent directory",
                path.display()
            )));
        };

        // the event callback takes `watched`, so it is never held across notify calls
        let dir_already_watched = {
            let watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
            if watched.contains(&path) {
                return Ok(());
            }
            watched.iter().any(|p| p.parent() == Some(dir.as_path()))
        };
        if !dir_already_watched {
            self.watcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    SnapshotError::WatcherError(format!("failed to watch {}: {e}", dir.display()))
                })?;
            log::debug!("Watching directory {}", dir.display());
        }
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path);
        Ok(())
    }

    pub fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let path = canonical_snapshot_path(path).unwrap_or_else(|_| path.to_path_buf());
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        let dir_unused = {
            let mut watched = self.watched.lock().unwrap_or_else(PoisonError::into_inner);
            if !watched.remove(&path) {
                return Ok(());
            }
            watched.iter().all(|p| p.parent() != Some(dir))
        };
        if dir_unused {
            self.watcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .unwatch(dir)
                .map_err(|e| SnapshotError::WatcherError(e.to_string()))?;
        }
        Ok(())
    }

    pub fn watch_count(&self) -> usize {
        self.watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Canonical directory joined with the file name, so a path stays stable
/// while the file itself is briefly missing during a rename-over save.
fn canonical_snapshot_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        SnapshotError::WatcherError(format!("{} is not a file path", path.display()))
    })?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(std::fs::canonicalize(dir)?.join(file_name))
}

fn handle_event(cache: &DocumentCache, watched: &Mutex<HashSet<PathBuf>>, event: &Event) {
    if !matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Create(_)
    ) {
        return;
    }
    let watched = watched.lock().unwrap_or_else(PoisonError::into_inner);
    for path in &event.paths {
        if !watched.contains(path) {
            continue;
        }
        if cache.invalidate(path) {
            log::info!("Snapshot {} changed, evicted from cache", path.display());
        }
    }
}
