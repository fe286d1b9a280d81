//! # Nucleus Snapshot
//!
//! Parsed snapshot documents and the shared document cache.
//!
//! ## Pipeline
//!
//! ```text
//! snapshot.txt
//!     │
//!     ├──> Document Cache (LRU, keyed by path + mtime)
//!     │      └─> Arc<SnapshotDocument>
//!     │
//!     ├──> Line Index (lines + char offsets)
//!     │      └─> regex search, grep matches
//!     │
//!     ├──> File Ranges (path -> start..=end)
//!     │      └─> context windows
//!     │
//!     └──> METADATA sections
//!            └─> precomputed import graph / export index
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use nucleus_snapshot::{DocumentCache, SearchOptions};
//!
//! let cache = DocumentCache::new(8);
//! let page = cache.search("snapshot.txt", r"export function \w+", &SearchOptions::default())?;
//! println!("{} matches", page.count);
//! # Ok::<(), nucleus_snapshot::SnapshotError>(())
//! ```

mod cache;
mod document;
mod error;
pub mod format;
mod metadata;
mod search;
mod watcher;

pub use cache::{CacheStats, DocumentCache, DEFAULT_CACHE_CAPACITY};
pub use document::{DocumentStats, FileRange, LineIndex, SnapshotDocument};
pub use error::{Result, SnapshotError};
pub use format::{render_file_section, SEPARATOR};
pub use metadata::{
    SnapshotMetadata, EXPORT_INDEX_SECTION, IMPORT_GRAPH_SECTION, WHO_IMPORTS_SECTION,
};
pub use search::{
    compile_pattern, context_window, search_document, ContextWindow, Match, SearchOptions,
    SearchPage,
};
pub use watcher::SnapshotWatcher;
