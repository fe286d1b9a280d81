use crate::format::{section_title_at, SectionTitle};
use crate::metadata::SnapshotMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Inclusive, 1-based line span of one file inside the [`LineIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRange {
    pub start: usize,
    pub end: usize,
}

impl FileRange {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }
}

/// Ordered lines of a snapshot plus the char offset each line starts at.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lines: Vec<String>,
    char_offsets: Vec<usize>,
}

impl LineIndex {
    pub fn from_text(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut char_offsets = Vec::new();
        let mut offset = 0usize;
        for raw in text.split_inclusive('\n') {
            char_offsets.push(offset);
            offset += raw.chars().count();
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            let line = line.strip_suffix('\r').unwrap_or(line);
            lines.push(line.to_string());
        }
        Self {
            lines,
            char_offsets,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line by 1-based number.
    pub fn get(&self, line_num: usize) -> Option<&str> {
        line_num
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    /// Char offset of the first character of a 1-based line.
    pub fn char_offset(&self, line_num: usize) -> Option<usize> {
        line_num
            .checked_sub(1)
            .and_then(|idx| self.char_offsets.get(idx))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.as_str()))
    }

    /// 1-based inclusive slice, clamped to the index.
    pub fn slice(&self, start: usize, end: usize) -> &[String] {
        let start = start.max(1);
        let end = end.min(self.lines.len());
        if start > end {
            return &[];
        }
        &self.lines[start - 1..end]
    }

    pub(crate) fn raw_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn total_chars(&self) -> usize {
        match (self.char_offsets.last(), self.lines.last()) {
            (Some(offset), Some(line)) => offset + line.chars().count(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub lines: usize,
    pub chars: usize,
    pub files: usize,
}

/// Immutable parsed snapshot, identified by path and modification time.
#[derive(Debug)]
pub struct SnapshotDocument {
    path: PathBuf,
    modified: SystemTime,
    lines: LineIndex,
    header_end: usize,
    file_order: Vec<String>,
    files: HashMap<String, FileRange>,
    metadata: SnapshotMetadata,
}

impl SnapshotDocument {
    pub fn parse(path: impl Into<PathBuf>, modified: SystemTime, text: &str) -> Self {
        let lines = LineIndex::from_text(text);
        let raw = lines.raw_lines();

        let mut frames: Vec<(usize, SectionTitle)> = Vec::new();
        let mut idx = 0;
        while idx < raw.len() {
            if let Some(title) = section_title_at(raw, idx) {
                frames.push((idx, title));
                idx += 3;
            } else {
                idx += 1;
            }
        }

        let header_end = frames.first().map_or(raw.len(), |(start, _)| *start);
        let mut file_order = Vec::new();
        let mut files = HashMap::new();
        let mut metadata_sections: Vec<(String, Vec<String>)> = Vec::new();

        for (pos, (frame_start, title)) in frames.iter().enumerate() {
            // 0-based, half open
            let content_start = frame_start + 3;
            let mut content_end = frames
                .get(pos + 1)
                .map_or(raw.len(), |(next_start, _)| *next_start);
            if content_end > content_start && raw[content_end - 1].trim().is_empty() {
                content_end -= 1;
            }

            match title {
                SectionTitle::File(rel_path) => {
                    if content_end <= content_start {
                        log::debug!("Empty file section {rel_path}, no range recorded");
                        if !files.contains_key(rel_path) {
                            file_order.push(rel_path.clone());
                        }
                        continue;
                    }
                    let range = FileRange {
                        start: content_start + 1,
                        end: content_end,
                    };
                    if files.insert(rel_path.clone(), range).is_some() {
                        log::warn!("Duplicate file section {rel_path}; keeping the last one");
                    } else {
                        file_order.push(rel_path.clone());
                    }
                }
                SectionTitle::Metadata(name) => {
                    let body = raw[content_start..content_end.max(content_start)].to_vec();
                    metadata_sections.push((name.clone(), body));
                }
            }
        }

        // Empty sections are listed but carry no range.
        file_order.retain(|path| files.contains_key(path));

        let metadata = SnapshotMetadata::from_sections(&metadata_sections);

        Self {
            path: path.into(),
            modified,
            lines,
            header_end,
            file_order,
            files,
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    /// Lines before the first section frame.
    pub fn header(&self) -> &[String] {
        self.lines.slice(1, self.header_end)
    }

    pub fn file_range(&self, rel_path: &str) -> Option<FileRange> {
        self.files
            .get(&nucleus_protocol::normalize_rel_path(rel_path))
            .copied()
    }

    /// Files in the order they appear in the snapshot.
    pub fn files(&self) -> impl Iterator<Item = (&str, FileRange)> {
        self.file_order
            .iter()
            .filter_map(|path| self.files.get(path).map(|range| (path.as_str(), *range)))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Full text of one file section.
    pub fn file_content(&self, rel_path: &str) -> Option<String> {
        let range = self.file_range(rel_path)?;
        Some(self.lines.slice(range.start, range.end).join("\n"))
    }

    /// File whose range contains an absolute 1-based line.
    pub fn file_at_line(&self, line_num: usize) -> Option<(&str, FileRange)> {
        self.files()
            .find(|(_, range)| range.contains(line_num))
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            lines: self.lines.len(),
            chars: self.lines.total_chars(),
            files: self.files.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{render_file_section, render_metadata_header};
    use pretty_assertions::assert_eq;

    fn sample() -> String {
        let mut text = String::from("# Snapshot of demo\nGenerated for tests\n");
        text.push_str(&render_file_section("src/a.ts", "import { b } from './b';\nexport function a() {}"));
        text.push_str(&render_file_section("src/b.ts", "export const b = 1;"));
        text
    }

    #[test]
    fn line_index_tracks_char_offsets() {
        let index = LineIndex::from_text("ab\ncdé\n\nz");
        assert_eq!(index.len(), 4);
        assert_eq!(index.get(2), Some("cdé"));
        assert_eq!(index.char_offset(1), Some(0));
        assert_eq!(index.char_offset(2), Some(3));
        assert_eq!(index.char_offset(4), Some(8));
        assert_eq!(index.get(0), None);
        assert_eq!(index.total_chars(), 9);
    }

    #[test]
    fn crlf_is_stripped_from_lines() {
        let index = LineIndex::from_text("a\r\nb\r\n");
        assert_eq!(index.get(1), Some("a"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.char_offset(2), Some(3));
    }

    #[test]
    fn parses_header_and_file_ranges() {
        let doc = SnapshotDocument::parse("demo.txt", SystemTime::UNIX_EPOCH, &sample());
        assert_eq!(doc.header().len(), 2);
        assert_eq!(doc.file_count(), 2);

        let a = doc.file_range("./src/a.ts").unwrap();
        assert_eq!(a, FileRange { start: 6, end: 7 });
        assert_eq!(doc.lines().get(a.start), Some("import { b } from './b';"));

        let b = doc.file_range("src/b.ts").unwrap();
        assert_eq!(doc.lines().get(b.start), Some("export const b = 1;"));
        assert_eq!(b.len(), 1);

        let order: Vec<&str> = doc.files().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["src/a.ts", "src/b.ts"]);
        assert_eq!(doc.file_at_line(7).map(|(p, _)| p), Some("src/a.ts"));
        assert_eq!(doc.file_at_line(1), None);
    }

    #[test]
    fn ranges_never_overlap() {
        let doc = SnapshotDocument::parse("demo.txt", SystemTime::UNIX_EPOCH, &sample());
        let ranges: Vec<FileRange> = doc.files().map(|(_, r)| r).collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn empty_file_sections_have_no_range() {
        let mut text = render_file_section("empty.ts", "");
        text.push_str(&render_file_section("full.ts", "x"));
        let doc = SnapshotDocument::parse("demo.txt", SystemTime::UNIX_EPOCH, &text);
        assert_eq!(doc.file_range("empty.ts"), None);
        assert!(doc.file_range("full.ts").is_some());
        assert_eq!(doc.file_count(), 1);
    }

    #[test]
    fn metadata_sections_are_not_files() {
        let mut text = sample();
        text.push_str(&render_metadata_header("IMPORT_GRAPH"));
        text.push_str("src/a.ts -> src/b.ts\n");
        let doc = SnapshotDocument::parse("demo.txt", SystemTime::UNIX_EPOCH, &text);
        assert_eq!(doc.file_count(), 2);
        assert_eq!(doc.file_content("src/b.ts").as_deref(), Some("export const b = 1;"));
        assert_eq!(
            doc.metadata().imports_of("src/a.ts"),
            vec!["src/b.ts".to_string()]
        );
    }

    #[test]
    fn document_without_sections_is_all_header() {
        let doc = SnapshotDocument::parse("plain.txt", SystemTime::UNIX_EPOCH, "one\ntwo\n");
        assert_eq!(doc.file_count(), 0);
        assert_eq!(doc.header().len(), 2);
        assert_eq!(doc.stats().lines, 2);
    }
}
