//! # Nucleus Graph
//!
//! Static import/export metadata for the files inside a snapshot.
//!
//! ## Architecture
//!
//! ```text
//! (relative path, source text)[]
//!     │
//!     ├──> Metadata Extractor (regex over fixed syntactic shapes)
//!     │      ├─ named / namespace / default / side-effect / dynamic imports
//!     │      ├─ re-exports and require() calls
//!     │      └─ function / class / const / type / interface / enum / default exports
//!     │
//!     ├──> Resolver (ordered suffix list, relative specifiers only)
//!     │
//!     └──> Project Metadata
//!            ├─ Import Graph   (file -> dependencies)
//!            ├─ Reverse Graph  (file -> dependents)
//!            ├─ Symbol Index   (symbol -> exporting files)
//!            └─ cycles / impact (petgraph)
//! ```

mod builder;
mod error;
mod graph;
mod types;

pub use builder::{MetadataExtractor, RESOLUTION_SUFFIXES};
pub use error::{GraphError, Result};
pub use graph::{ImpactedFile, ProjectMetadata};
pub use types::{
    is_relative_spec, is_supported_source, ExportKind, ExportRecord, ImportEdge,
    SOURCE_EXTENSIONS,
};
