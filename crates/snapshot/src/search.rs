use crate::document::{LineIndex, SnapshotDocument};
use crate::error::{Result, SnapshotError};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One regex hit inside the line index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Matched text
    #[serde(rename = "match")]
    pub matched: String,

    /// Full line containing the match
    pub line: String,

    /// 1-based line number in the snapshot
    pub line_num: usize,

    /// Char offset of the match start from the beginning of the snapshot
    pub index: usize,

    /// Capture groups 1..n (`None` when a group did not participate)
    pub groups: Vec<Option<String>>,
}

impl Match {
    fn from_captures(caps: &regex::Captures<'_>, line: &str, line_num: usize, line_offset: usize) -> Option<Self> {
        let whole = caps.get(0)?;
        let index = line_offset + line[..whole.start()].chars().count();
        let groups = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        Some(Self {
            matched: whole.as_str().to_string(),
            line: line.to_string(),
            line_num,
            index,
            groups,
        })
    }
}

impl LineIndex {
    /// Every non-overlapping match across all lines, in document order,
    /// stopping once `limit` matches were collected. The flag reports whether
    /// the limit cut the scan short.
    pub fn find_matches(&self, regex: &Regex, limit: Option<usize>) -> (Vec<Match>, bool) {
        let mut out = Vec::new();
        for (line_num, line) in self.iter() {
            let line_offset = self.char_offset(line_num).unwrap_or(0);
            for caps in regex.captures_iter(line) {
                if limit.is_some_and(|max| out.len() >= max) {
                    return (out, true);
                }
                if let Some(m) = Match::from_captures(&caps, line, line_num, line_offset) {
                    out.push(m);
                }
            }
        }
        (out, false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub max_results: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            max_results: 100,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub matches: Vec<Match>,
    /// Total matches in the document, independent of pagination
    pub count: usize,
    pub offset: usize,
    pub has_more: bool,
}

pub fn compile_pattern(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(SnapshotError::from)
}

pub fn search_document(
    document: &SnapshotDocument,
    pattern: &str,
    options: &SearchOptions,
) -> Result<SearchPage> {
    let regex = compile_pattern(pattern, options.case_insensitive)?;
    let lines = document.lines();
    let window_end = options.offset.saturating_add(options.max_results);

    let mut count = 0usize;
    let mut matches = Vec::new();
    for (line_num, line) in lines.iter() {
        let line_offset = lines.char_offset(line_num).unwrap_or(0);
        for caps in regex.captures_iter(line) {
            if count >= options.offset && count < window_end {
                if let Some(m) = Match::from_captures(&caps, line, line_num, line_offset) {
                    matches.push(m);
                }
            }
            count += 1;
        }
    }

    Ok(SearchPage {
        has_more: count > window_end,
        matches,
        count,
        offset: options.offset,
    })
}

/// Window of lines around a target line, clamped to one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextWindow {
    pub file: String,
    /// Target line, 1-based relative to the file
    pub line: usize,
    /// First line shown, relative to the file
    pub start: usize,
    /// Last line shown, relative to the file
    pub end: usize,
    pub text: String,
}

pub fn context_window(
    document: &SnapshotDocument,
    file: &str,
    line: usize,
    before: usize,
    after: usize,
) -> Result<ContextWindow> {
    let file = nucleus_protocol::normalize_rel_path(file);
    let range = document
        .file_range(&file)
        .ok_or_else(|| SnapshotError::file_not_found(&file))?;

    let file_len = range.len();
    let target = line.clamp(1, file_len);
    let start = target.saturating_sub(before).max(1);
    let end = target.saturating_add(after).min(file_len);

    let width = end.to_string().len();
    let lines = document.lines().slice(range.start + start - 1, range.start + end - 1);
    let text = lines
        .iter()
        .zip(start..)
        .map(|(content, num)| {
            let marker = if num == target { '>' } else { ' ' };
            format!("{marker} {num:>width$} | {content}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ContextWindow {
        file,
        line: target,
        start,
        end,
        text,
    })
}
