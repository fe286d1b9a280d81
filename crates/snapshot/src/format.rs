//! Snapshot text framing.
//!
//! ```text
//! <header lines>
//! ================================================================================
//! FILE: ./src/a.ts
//! ================================================================================
//! <verbatim content>
//!
//! ================================================================================
//! METADATA: IMPORT_GRAPH
//! ================================================================================
//! src/a.ts -> src/b.ts
//! ```

/// Minimum run of `=` that counts as a separator line.
pub const MIN_SEPARATOR_LEN: usize = 20;

/// Separator emitted by writers.
pub const SEPARATOR: &str =
    "================================================================================";

pub const FILE_PREFIX: &str = "FILE: ";
pub const METADATA_PREFIX: &str = "METADATA: ";

/// Kind of section introduced by a `<separator>/<title>/<separator>` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionTitle {
    File(String),
    Metadata(String),
}

pub fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= MIN_SEPARATOR_LEN && line.bytes().all(|b| b == b'=')
}

/// If `lines[idx..idx + 3]` is a section frame, return its title.
pub fn section_title_at(lines: &[String], idx: usize) -> Option<SectionTitle> {
    if idx + 2 >= lines.len() {
        return None;
    }
    if !is_separator(&lines[idx]) || !is_separator(&lines[idx + 2]) {
        return None;
    }
    parse_title(&lines[idx + 1])
}

fn parse_title(line: &str) -> Option<SectionTitle> {
    let line = line.trim_end();
    if let Some(rest) = line.strip_prefix(FILE_PREFIX) {
        let path = nucleus_protocol::normalize_rel_path(rest);
        if path.is_empty() {
            return None;
        }
        return Some(SectionTitle::File(path));
    }
    if let Some(rest) = line.strip_prefix(METADATA_PREFIX) {
        let name = rest.trim();
        if name.is_empty() {
            return None;
        }
        return Some(SectionTitle::Metadata(name.to_ascii_uppercase()));
    }
    None
}

/// Render one file section the way snapshot writers frame it.
pub fn render_file_section(rel_path: &str, content: &str) -> String {
    let mut out = String::with_capacity(content.len() + SEPARATOR.len() * 2 + 32);
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(FILE_PREFIX);
    out.push_str("./");
    out.push_str(&nucleus_protocol::normalize_rel_path(rel_path));
    out.push('\n');
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out
}

pub fn render_metadata_header(section: &str) -> String {
    format!("{SEPARATOR}\n{METADATA_PREFIX}{section}\n{SEPARATOR}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn separator_needs_minimum_length() {
        assert!(is_separator(SEPARATOR));
        assert!(is_separator(&"=".repeat(20)));
        assert!(!is_separator(&"=".repeat(19)));
        assert!(!is_separator("==== x ===================="));
    }

    #[test]
    fn detects_file_and_metadata_frames() {
        let doc = lines(&[SEPARATOR, "FILE: ./src/a.ts", SEPARATOR, "x"]);
        assert_eq!(
            section_title_at(&doc, 0),
            Some(SectionTitle::File("src/a.ts".to_string()))
        );

        let doc = lines(&[SEPARATOR, "METADATA: import_graph", SEPARATOR]);
        assert_eq!(
            section_title_at(&doc, 0),
            Some(SectionTitle::Metadata("IMPORT_GRAPH".to_string()))
        );

        let doc = lines(&[SEPARATOR, "just text", SEPARATOR]);
        assert_eq!(section_title_at(&doc, 0), None);
    }

    #[test]
    fn rendered_section_round_trips_title() {
        let rendered = render_file_section("lib/x.js", "let a = 1;");
        let doc: Vec<String> = rendered.lines().map(str::to_string).collect();
        assert_eq!(
            section_title_at(&doc, 0),
            Some(SectionTitle::File("lib/x.js".to_string()))
        );
        assert_eq!(doc[3], "let a = 1;");
    }
}
