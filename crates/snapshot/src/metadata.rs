use crate::format::render_metadata_header;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const IMPORT_GRAPH_SECTION: &str = "IMPORT_GRAPH";
pub const EXPORT_INDEX_SECTION: &str = "EXPORT_INDEX";
pub const WHO_IMPORTS_SECTION: &str = "WHO_IMPORTS";

/// Precomputed structural data carried in trailing `METADATA:` sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// file -> resolved dependencies
    pub import_graph: BTreeMap<String, BTreeSet<String>>,
    /// symbol -> exporting files
    pub export_index: BTreeMap<String, BTreeSet<String>>,
    /// file -> importers
    pub who_imports: BTreeMap<String, BTreeSet<String>>,
}

impl SnapshotMetadata {
    pub fn from_sections(sections: &[(String, Vec<String>)]) -> Self {
        let mut meta = Self::default();
        for (name, body) in sections {
            let (target, delimiter) = match name.as_str() {
                IMPORT_GRAPH_SECTION => (&mut meta.import_graph, "->"),
                EXPORT_INDEX_SECTION => (&mut meta.export_index, ":"),
                WHO_IMPORTS_SECTION => (&mut meta.who_imports, "<-"),
                other => {
                    log::debug!("Skipping unknown metadata section {other}");
                    continue;
                }
            };
            for line in body {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_entry(line, delimiter) {
                    Some((key, values)) => {
                        target.entry(key).or_default().extend(values);
                    }
                    None => log::debug!("Skipping malformed {name} line: {line}"),
                }
            }
        }
        meta
    }

    pub fn is_empty(&self) -> bool {
        self.import_graph.is_empty() && self.export_index.is_empty() && self.who_imports.is_empty()
    }

    pub fn imports_of(&self, file: &str) -> Vec<String> {
        lookup(&self.import_graph, file)
    }

    pub fn importers_of(&self, file: &str) -> Vec<String> {
        lookup(&self.who_imports, file)
    }

    pub fn exporters_of(&self, symbol: &str) -> Vec<String> {
        self.export_index
            .get(symbol)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Render all non-empty sections in snapshot framing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_section(&mut out, IMPORT_GRAPH_SECTION, &self.import_graph, " -> ");
        render_section(&mut out, EXPORT_INDEX_SECTION, &self.export_index, ": ");
        render_section(&mut out, WHO_IMPORTS_SECTION, &self.who_imports, " <- ");
        out
    }
}

fn lookup(map: &BTreeMap<String, BTreeSet<String>>, file: &str) -> Vec<String> {
    map.get(&nucleus_protocol::normalize_rel_path(file))
        .map(|files| files.iter().cloned().collect())
        .unwrap_or_default()
}

fn parse_entry(line: &str, delimiter: &str) -> Option<(String, Vec<String>)> {
    let (key, rest) = line.split_once(delimiter)?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let key = if delimiter == ":" {
        key.to_string()
    } else {
        nucleus_protocol::normalize_rel_path(key)
    };
    let values = rest
        .split(',')
        .map(nucleus_protocol::normalize_rel_path)
        .filter(|v| !v.is_empty())
        .collect();
    Some((key, values))
}

fn render_section(
    out: &mut String,
    name: &str,
    map: &BTreeMap<String, BTreeSet<String>>,
    delimiter: &str,
) {
    if map.is_empty() {
        return;
    }
    out.push_str(&render_metadata_header(name));
    for (key, values) in map {
        let joined = values.iter().cloned().collect::<Vec<_>>().join(", ");
        out.push_str(key);
        out.push_str(delimiter);
        out.push_str(&joined);
        out.push('\n');
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn section(name: &str, lines: &[&str]) -> (String, Vec<String>) {
        (
            name.to_string(),
            lines.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn parses_all_three_sections() {
        let meta = SnapshotMetadata::from_sections(&[
            section(IMPORT_GRAPH_SECTION, &["./src/a.ts -> src/b.ts, src/c.ts", ""]),
            section(EXPORT_INDEX_SECTION, &["foo: src/b.ts, src/c.ts"]),
            section(WHO_IMPORTS_SECTION, &["src/b.ts <- src/a.ts"]),
        ]);
        assert_eq!(meta.imports_of("src/a.ts"), vec!["src/b.ts", "src/c.ts"]);
        assert_eq!(meta.exporters_of("foo"), vec!["src/b.ts", "src/c.ts"]);
        assert_eq!(meta.importers_of("./src/b.ts"), vec!["src/a.ts"]);
        assert!(meta.exporters_of("missing").is_empty());
    }

    #[test]
    fn skips_malformed_lines_and_unknown_sections() {
        let meta = SnapshotMetadata::from_sections(&[
            section(IMPORT_GRAPH_SECTION, &["no arrow here", " -> orphan"]),
            section("CALL_GRAPH", &["a -> b"]),
        ]);
        assert!(meta.is_empty());
    }

    #[test]
    fn render_then_parse_preserves_content() {
        let mut meta = SnapshotMetadata::default();
        meta.import_graph
            .entry("a.ts".to_string())
            .or_default()
            .insert("b.ts".to_string());
        meta.export_index
            .entry("run".to_string())
            .or_default()
            .insert("b.ts".to_string());

        let rendered = meta.render();
        let doc = crate::SnapshotDocument::parse(
            "meta.txt",
            std::time::SystemTime::UNIX_EPOCH,
            &rendered,
        );
        assert_eq!(doc.metadata(), &meta);
    }
}
