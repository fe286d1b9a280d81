use crate::builder::MetadataExtractor;
use crate::error::{GraphError, Result};
use crate::types::{is_supported_source, ExportRecord, ImportEdge};
use nucleus_protocol::normalize_rel_path;
use nucleus_snapshot::{SnapshotDocument, SnapshotMetadata};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// A dependent reached while walking the reverse graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactedFile {
    pub file: String,
    /// Import hops from the changed file
    pub distance: usize,
}

/// Import graph, reverse graph, and symbol index for one snapshot.
///
/// Only edges whose target resolves to a file inside the snapshot make it
/// into the graphs; unresolved edges stay available through [`imports`].
///
/// [`imports`]: ProjectMetadata::imports
#[derive(Debug, Clone, Default)]
pub struct ProjectMetadata {
    files: BTreeSet<String>,
    imports: Vec<ImportEdge>,
    exports: Vec<ExportRecord>,
    import_graph: BTreeMap<String, BTreeSet<String>>,
    reverse_graph: BTreeMap<String, BTreeSet<String>>,
    symbol_index: BTreeMap<String, BTreeSet<String>>,
}

impl ProjectMetadata {
    /// Build from `(relative path, source text)` pairs. Files with an
    /// unsupported extension are skipped entirely.
    pub fn build<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let extractor = MetadataExtractor::new();
        let sources: Vec<(String, &str)> = sources
            .into_iter()
            .map(|(path, text)| (normalize_rel_path(path), text))
            .filter(|(path, _)| {
                let supported = is_supported_source(path);
                if !supported {
                    log::debug!("Skipping unsupported file {path}");
                }
                supported
            })
            .collect();

        let known: HashSet<String> = sources.iter().map(|(path, _)| path.clone()).collect();
        let mut meta = Self {
            files: known.iter().cloned().collect(),
            ..Self::default()
        };

        for (path, text) in &sources {
            for mut edge in extractor.extract_imports(path, text) {
                edge.resolved = extractor.resolve(path, &edge.target_spec, &known);
                if let Some(target) = &edge.resolved {
                    meta.import_graph
                        .entry(path.clone())
                        .or_default()
                        .insert(target.clone());
                    meta.reverse_graph
                        .entry(target.clone())
                        .or_default()
                        .insert(path.clone());
                }
                meta.imports.push(edge);
            }

            for record in extractor.extract_exports(path, text) {
                meta.symbol_index
                    .entry(record.symbol.clone())
                    .or_default()
                    .insert(record.file.clone());
                meta.exports.push(record);
            }
        }

        log::info!(
            "Extracted metadata: {} files, {} imports ({} resolved), {} exports",
            meta.files.len(),
            meta.imports.len(),
            meta.imports.iter().filter(|e| e.resolved.is_some()).count(),
            meta.exports.len()
        );
        meta
    }

    /// Build from a cached snapshot's file sections, falling back to its
    /// precomputed METADATA sections when no section holds a supported source.
    pub fn from_document(document: &SnapshotDocument) -> Self {
        let contents: Vec<(String, String)> = document
            .files()
            .filter(|(path, _)| is_supported_source(path))
            .filter_map(|(path, _)| {
                document
                    .file_content(path)
                    .map(|text| (path.to_string(), text))
            })
            .collect();

        if contents.is_empty() && !document.metadata().is_empty() {
            log::debug!("No source sections; using embedded snapshot metadata");
            return Self::from_snapshot_metadata(document.metadata());
        }

        Self::build(contents.iter().map(|(p, t)| (p.as_str(), t.as_str())))
    }

    /// Rehydrate graphs from precomputed metadata. Edge and export details
    /// (symbols, lines, kinds) are not part of that format and stay empty.
    pub fn from_snapshot_metadata(snapshot: &SnapshotMetadata) -> Self {
        let mut meta = Self {
            import_graph: snapshot.import_graph.clone(),
            symbol_index: snapshot.export_index.clone(),
            ..Self::default()
        };
        for (file, deps) in &snapshot.import_graph {
            meta.files.insert(file.clone());
            for dep in deps {
                meta.files.insert(dep.clone());
                meta.reverse_graph
                    .entry(dep.clone())
                    .or_default()
                    .insert(file.clone());
            }
        }
        for (file, importers) in &snapshot.who_imports {
            meta.files.insert(file.clone());
            for importer in importers {
                meta.files.insert(importer.clone());
                meta.reverse_graph
                    .entry(file.clone())
                    .or_default()
                    .insert(importer.clone());
                meta.import_graph
                    .entry(importer.clone())
                    .or_default()
                    .insert(file.clone());
            }
        }
        meta
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn is_analyzed(&self, file: &str) -> bool {
        self.files.contains(&normalize_rel_path(file))
    }

    /// Every import edge, resolved or not.
    pub fn imports(&self) -> &[ImportEdge] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportRecord] {
        &self.exports
    }

    pub fn import_graph(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.import_graph
    }

    pub fn reverse_graph(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.reverse_graph
    }

    pub fn symbol_index(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.symbol_index
    }

    /// Resolved dependencies of `file`; empty for unknown files.
    pub fn imports_of(&self, file: &str) -> Vec<String> {
        set_to_vec(self.import_graph.get(&normalize_rel_path(file)))
    }

    /// Files importing `file`; empty for unknown files.
    pub fn importers_of(&self, file: &str) -> Vec<String> {
        set_to_vec(self.reverse_graph.get(&normalize_rel_path(file)))
    }

    /// Every file exporting `symbol`, without disambiguation.
    pub fn exporters_of(&self, symbol: &str) -> Vec<String> {
        set_to_vec(self.symbol_index.get(symbol.trim()))
    }

    pub fn edges_from<'a>(&'a self, file: &str) -> impl Iterator<Item = &'a ImportEdge> + 'a {
        let file = normalize_rel_path(file);
        self.imports.iter().filter(move |edge| edge.source == file)
    }

    pub fn exports_of<'a>(&'a self, file: &str) -> impl Iterator<Item = &'a ExportRecord> + 'a {
        let file = normalize_rel_path(file);
        self.exports.iter().filter(move |record| record.file == file)
    }

    /// Like [`imports_of`](Self::imports_of) but distinguishes files the
    /// extractor never reads from source files missing from the snapshot.
    pub fn try_imports_of(&self, file: &str) -> Result<Vec<String>> {
        let normalized = normalize_rel_path(file);
        if !is_supported_source(&normalized) {
            return Err(GraphError::UnsupportedFile(normalized));
        }
        if !self.is_analyzed(&normalized) {
            return Err(GraphError::FileNotFound(normalized));
        }
        Ok(self.imports_of(file))
    }

    /// Import cycles: strongly connected components with more than one file,
    /// plus files importing themselves. Sorted for stable output.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let graph = self.to_petgraph();
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&node| graph.contains_edge(node, node))
            })
            .map(|component| {
                let mut files: Vec<String> = component
                    .into_iter()
                    .map(|node| graph[node].to_string())
                    .collect();
                files.sort();
                files
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Transitive dependents of `file` up to `max_depth` hops, nearest first.
    pub fn impact(&self, file: &str, max_depth: usize) -> Vec<ImpactedFile> {
        let start = normalize_rel_path(file);
        let mut seen: HashSet<String> = HashSet::from([start.clone()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start, 0)]);
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(importers) = self.reverse_graph.get(&current) else {
                continue;
            };
            for importer in importers {
                if seen.insert(importer.clone()) {
                    out.push(ImpactedFile {
                        file: importer.clone(),
                        distance: depth + 1,
                    });
                    queue.push_back((importer.clone(), depth + 1));
                }
            }
        }
        out
    }

    /// Project into the METADATA section format.
    pub fn to_snapshot_metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            import_graph: self.import_graph.clone(),
            export_index: self.symbol_index.clone(),
            who_imports: self.reverse_graph.clone(),
        }
    }

    fn to_petgraph(&self) -> DiGraph<&str, ()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for (from, deps) in &self.import_graph {
            let from_idx = *nodes
                .entry(from.as_str())
                .or_insert_with(|| graph.add_node(from.as_str()));
            for dep in deps {
                let to_idx = *nodes
                    .entry(dep.as_str())
                    .or_insert_with(|| graph.add_node(dep.as_str()));
                graph.add_edge(from_idx, to_idx, ());
            }
        }
        graph
    }
}

fn set_to_vec(set: Option<&BTreeSet<String>>) -> Vec<String> {
    set.map(|files| files.iter().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project() -> ProjectMetadata {
        ProjectMetadata::build([
            ("./a.ts", "import { b } from './b';\nimport _ from 'lodash';\nexport function a() {}"),
            ("b.ts", "import { c } from './c';\nexport const b = 1;"),
            ("c.ts", "import { b } from './b';\nexport function c() {}\nexport function a() {}"),
            ("README.md", "import x from './a';"),
        ])
    }

    #[test]
    fn relative_import_creates_graph_edge() {
        let meta = project();
        assert_eq!(meta.imports_of("a.ts"), vec!["b.ts"]);
        assert_eq!(meta.importers_of("b.ts"), vec!["a.ts", "c.ts"]);
    }

    #[test]
    fn external_import_has_no_graph_edge() {
        let meta = project();
        let lodash: Vec<&ImportEdge> = meta
            .edges_from("a.ts")
            .filter(|e| e.target_spec == "lodash")
            .collect();
        assert_eq!(lodash.len(), 1);
        assert_eq!(lodash[0].resolved, None);
        assert!(!meta.imports_of("a.ts").contains(&"lodash".to_string()));
    }

    #[test]
    fn symbol_index_keeps_all_exporters() {
        let meta = project();
        assert_eq!(meta.exporters_of("a"), vec!["a.ts", "c.ts"]);
        assert!(meta.exporters_of("nope").is_empty());
    }

    #[test]
    fn unsupported_files_are_skipped_not_empty() {
        let meta = project();
        assert!(!meta.is_analyzed("README.md"));
        assert!(meta.is_analyzed("a.ts"));
        assert!(matches!(
            meta.try_imports_of("README.md"),
            Err(GraphError::UnsupportedFile(path)) if path == "README.md"
        ));
        assert!(matches!(
            meta.try_imports_of("./missing.ts"),
            Err(GraphError::FileNotFound(path)) if path == "missing.ts"
        ));
        assert_eq!(meta.try_imports_of("c.ts").unwrap(), vec!["b.ts"]);
        assert!(meta.importers_of("a.ts").is_empty());
    }

    #[test]
    fn detects_cycles() {
        let meta = project();
        assert_eq!(meta.cycles(), vec![vec!["b.ts".to_string(), "c.ts".to_string()]]);

        let self_loop = ProjectMetadata::build([("x.ts", "import './x';")]);
        assert_eq!(self_loop.cycles(), vec![vec!["x.ts".to_string()]]);
    }

    #[test]
    fn impact_walks_dependents_breadth_first() {
        let meta = project();
        let impact = meta.impact("c.ts", 5);
        assert_eq!(
            impact,
            vec![
                ImpactedFile { file: "b.ts".into(), distance: 1 },
                ImpactedFile { file: "a.ts".into(), distance: 2 },
            ]
        );
        assert_eq!(meta.impact("c.ts", 1).len(), 1);
        assert!(meta.impact("c.ts", 0).is_empty());
    }

    #[test]
    fn snapshot_metadata_round_trip() {
        let meta = project();
        let rehydrated = ProjectMetadata::from_snapshot_metadata(&meta.to_snapshot_metadata());
        assert_eq!(rehydrated.import_graph(), meta.import_graph());
        assert_eq!(rehydrated.reverse_graph(), meta.reverse_graph());
        assert_eq!(rehydrated.exporters_of("c"), vec!["c.ts"]);
    }
}
