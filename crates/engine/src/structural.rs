use lru::LruCache;
use nucleus_graph::{ImpactedFile, ProjectMetadata};
use nucleus_snapshot::{context_window, ContextWindow, DocumentStats, SnapshotDocument};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Zero-cost questions answered from the snapshot alone.
///
/// Built once per document handle; nothing here talks to a provider.
/// Unknown files and symbols produce empty results rather than errors.
pub struct StructuralQueries {
    document: Arc<SnapshotDocument>,
    metadata: Arc<ProjectMetadata>,
}

impl StructuralQueries {
    pub fn new(document: Arc<SnapshotDocument>) -> Self {
        let metadata = Arc::new(ProjectMetadata::from_document(&document));
        Self { document, metadata }
    }

    /// Pair a document with metadata already extracted from it.
    pub fn with_metadata(document: Arc<SnapshotDocument>, metadata: Arc<ProjectMetadata>) -> Self {
        Self { document, metadata }
    }

    pub fn document(&self) -> &SnapshotDocument {
        &self.document
    }

    pub fn metadata(&self) -> &Arc<ProjectMetadata> {
        &self.metadata
    }

    pub fn file_imports(&self, file: &str) -> Vec<String> {
        self.metadata.imports_of(file)
    }

    pub fn importers(&self, file: &str) -> Vec<String> {
        self.metadata.importers_of(file)
    }

    pub fn exporters(&self, symbol: &str) -> Vec<String> {
        self.metadata.exporters_of(symbol)
    }

    pub fn line_context(
        &self,
        file: &str,
        line: usize,
        before: usize,
        after: usize,
    ) -> Option<ContextWindow> {
        context_window(&self.document, file, line, before, after).ok()
    }

    pub fn cycles(&self) -> Vec<Vec<String>> {
        self.metadata.cycles()
    }

    pub fn impact(&self, file: &str, max_depth: usize) -> Vec<ImpactedFile> {
        self.metadata.impact(file, max_depth)
    }

    pub fn stats(&self) -> DocumentStats {
        self.document.stats()
    }
}

struct MemoEntry {
    document: Weak<SnapshotDocument>,
    metadata: Arc<ProjectMetadata>,
}

/// Extracted project metadata keyed by snapshot path.
///
/// An entry is reused only while the cache still hands out the same document
/// allocation it was built from, so a re-parse after an mtime change rebuilds
/// it. Entries hold the document weakly and never keep an evicted snapshot
/// alive.
pub(crate) struct MetadataMemo {
    entries: Mutex<LruCache<PathBuf, MemoEntry>>,
}

impl MetadataMemo {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn get_or_build(&self, document: &Arc<SnapshotDocument>) -> Arc<ProjectMetadata> {
        let key = document.path().to_path_buf();
        if let Some(entry) = self.lock().get(&key) {
            if std::ptr::eq(entry.document.as_ptr(), Arc::as_ptr(document)) {
                return entry.metadata.clone();
            }
        }

        let metadata = Arc::new(ProjectMetadata::from_document(document));
        log::debug!("Extracted project metadata for {}", key.display());
        self.lock().put(
            key,
            MemoEntry {
                document: Arc::downgrade(document),
                metadata: metadata.clone(),
            },
        );
        metadata
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<PathBuf, MemoEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
