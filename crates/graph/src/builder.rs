use crate::types::{is_relative_spec, ExportKind, ExportRecord, ImportEdge};
use nucleus_protocol::{join_rel_path, parent_dir};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NAMED_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import\s+(type\s+)?(?:([\w$]+)\s*,\s*)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#,
    )
    .expect("named import regex")
});

static NAMESPACE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import\s+(type\s+)?(?:([\w$]+)\s*,\s*)?\*\s*as\s+([\w$]+)\s+from\s*['"]([^'"]+)['"]"#,
    )
    .expect("namespace import regex")
});

static DEFAULT_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(type\s+)?([\w$]+)\s+from\s*['"]([^'"]+)['"]"#)
        .expect("default import regex")
});

static SIDE_EFFECT_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*['"]([^'"]+)['"]"#).expect("side-effect import regex")
});

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("dynamic import regex")
});

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("require regex")
});

static NAMED_REEXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s+(type\s+)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#)
        .expect("named re-export regex")
});

static STAR_REEXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s+\*\s*(?:as\s+([\w$]+)\s+)?from\s*['"]([^'"]+)['"]"#)
        .expect("star re-export regex")
});

static EXPORT_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+(default\s+)?(?:async\s+)?function\b\s*\*?\s*([\w$]+)?")
        .expect("export function regex")
});

static EXPORT_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+(default\s+)?(?:abstract\s+)?class\b\s*([\w$]+)?")
        .expect("export class regex")
});

static EXPORT_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+(?:const|let|var)\s+([\w$]+)").expect("export const regex")
});

static EXPORT_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+type\s+([\w$]+)\s*(?:<[^>]*>)?\s*=")
        .expect("export type regex")
});

static EXPORT_INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+interface\s+([\w$]+)").expect("export interface regex")
});

static EXPORT_ENUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:const\s+)?enum\s+([\w$]+)")
        .expect("export enum regex")
});

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+default\s+([\w$]*)").expect("export default regex")
});

/// Candidate suffixes tried, in order, when resolving a relative specifier.
pub const RESOLUTION_SUFFIXES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".mjs",
    ".cjs",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/index.jsx",
];

/// Extracts import edges and export records from source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// All import edges of one file, unresolved, ordered by position.
    pub fn extract_imports(&self, file: &str, content: &str) -> Vec<ImportEdge> {
        let lines = LineLocator::new(content);
        let mut found: Vec<(usize, ImportEdge)> = Vec::new();
        let mut push = |offset: usize,
                        spec: &str,
                        symbols: Vec<String>,
                        is_default: bool,
                        is_type: bool| {
            found.push((
                offset,
                ImportEdge {
                    source: file.to_string(),
                    target_spec: spec.to_string(),
                    resolved: None,
                    symbols,
                    is_default,
                    is_type,
                    line: lines.line_of(offset),
                },
            ));
        };

        for caps in NAMED_IMPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let mut symbols = Vec::new();
            let default = caps.get(2).map(|m| m.as_str().to_string());
            if let Some(default) = &default {
                symbols.push(default.clone());
            }
            symbols.extend(parse_name_list(caps.get(3).map_or("", |m| m.as_str())));
            push(offset, &caps[4], symbols, default.is_some(), caps.get(1).is_some());
        }

        for caps in NAMESPACE_IMPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let mut symbols = Vec::new();
            let default = caps.get(2).map(|m| m.as_str().to_string());
            if let Some(default) = &default {
                symbols.push(default.clone());
            }
            symbols.push(format!("* as {}", &caps[3]));
            push(offset, &caps[4], symbols, default.is_some(), caps.get(1).is_some());
        }

        for caps in DEFAULT_IMPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            push(offset, &caps[3], vec![caps[2].to_string()], true, caps.get(1).is_some());
        }

        for caps in SIDE_EFFECT_IMPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            push(offset, &caps[1], Vec::new(), false, false);
        }

        for caps in DYNAMIC_IMPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            push(offset, &caps[1], Vec::new(), false, false);
        }

        for caps in REQUIRE_CALL.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            push(offset, &caps[1], Vec::new(), false, false);
        }

        for caps in NAMED_REEXPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let symbols = parse_name_list(&caps[2]);
            push(offset, &caps[3], symbols, false, caps.get(1).is_some());
        }

        for caps in STAR_REEXPORT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let symbol = match caps.get(1) {
                Some(ns) => format!("* as {}", ns.as_str()),
                None => "*".to_string(),
            };
            push(offset, &caps[2], vec![symbol], false, false);
        }

        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, edge)| edge).collect()
    }

    /// All export declarations of one file, ordered by position.
    pub fn extract_exports(&self, file: &str, content: &str) -> Vec<ExportRecord> {
        let lines = LineLocator::new(content);
        let mut found: Vec<(usize, ExportRecord)> = Vec::new();
        let mut push =
            |offset: usize, symbol: String, kind: ExportKind, signature: Option<String>| {
            found.push((
                offset,
                ExportRecord {
                    file: file.to_string(),
                    symbol,
                    kind,
                    signature,
                    line: lines.line_of(offset),
                },
            ));
        };

        for caps in EXPORT_FUNCTION.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let signature = function_signature(content, whole.start(), whole.end());
            match caps.get(2) {
                Some(name) => push(
                    whole.start(),
                    name.as_str().to_string(),
                    ExportKind::Function,
                    signature,
                ),
                None => push(
                    whole.start(),
                    "default".to_string(),
                    ExportKind::Default,
                    signature,
                ),
            }
        }

        for caps in EXPORT_CLASS.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            match caps.get(2) {
                Some(name) => push(offset, name.as_str().to_string(), ExportKind::Class, None),
                None => push(offset, "default".to_string(), ExportKind::Default, None),
            }
        }

        for (regex, kind) in [
            (&*EXPORT_VARIABLE, ExportKind::Const),
            (&*EXPORT_TYPE, ExportKind::Type),
            (&*EXPORT_INTERFACE, ExportKind::Interface),
            (&*EXPORT_ENUM, ExportKind::Enum),
        ] {
            for caps in regex.captures_iter(content) {
                let offset = caps.get(0).map_or(0, |m| m.start());
                // `export const enum X` belongs to the enum pattern
                if kind == ExportKind::Const && &caps[1] == "enum" {
                    continue;
                }
                push(offset, caps[1].to_string(), kind, None);
            }
        }

        for caps in EXPORT_DEFAULT.captures_iter(content) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            let head = caps.get(1).map_or("", |m| m.as_str());
            if matches!(head, "function" | "async" | "class" | "abstract") {
                continue;
            }
            push(offset, "default".to_string(), ExportKind::Default, None);
        }

        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, record)| record).collect()
    }

    /// Resolve a relative specifier against the known file set. The first
    /// existing candidate wins; bare specifiers are external and never resolve.
    pub fn resolve(&self, from_file: &str, spec: &str, known: &HashSet<String>) -> Option<String> {
        if !is_relative_spec(spec) {
            return None;
        }
        let base = join_rel_path(parent_dir(from_file), spec)?;

        for suffix in RESOLUTION_SUFFIXES {
            let candidate = format!("{base}{suffix}");
            if known.contains(&candidate) {
                return Some(candidate);
            }
        }

        // TS ESM style: `./b.js` written in source, `b.ts` on disk
        for (written, actual) in [
            (".js", &[".ts", ".tsx"][..]),
            (".jsx", &[".tsx"][..]),
            (".mjs", &[".mts"][..]),
        ] {
            if let Some(stem) = base.strip_suffix(written) {
                for ext in actual {
                    let candidate = format!("{stem}{ext}");
                    if known.contains(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}

/// `a, b as c, type D` -> `["a", "b", "D"]`
fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("type ").unwrap_or(item).trim();
            let name = item.split_whitespace().next()?;
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Declaration text from the start of `export` up to the body brace, with
/// `export`/`default` stripped and whitespace collapsed.
fn function_signature(content: &str, start: usize, head_end: usize) -> Option<String> {
    let rest = &content[head_end..];
    let open = rest.find('(')?;
    let mut depth = 0usize;
    let mut close = None;
    for (idx, ch) in rest[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = Some(head_end + open + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;
    let body = declaration_end(content, close + 1);
    let raw = content[start..body].trim();
    let raw = raw.strip_prefix("export").unwrap_or(raw).trim_start();
    let raw = raw.strip_prefix("default").unwrap_or(raw).trim_start();
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Byte index where a function head ends: the `{` opening its body, a `;`
/// ending an overload, or the end of input. A `{` seen where the return type
/// still expects an operand (after `:`, `|`, `&`, `,`, `=>`) belongs to an
/// object type literal and is skipped along with its contents.
fn declaration_end(content: &str, from: usize) -> usize {
    let mut depth = 0usize;
    let mut expect_type = false;
    let mut chars = content[from..].char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '{' if depth == 0 && !expect_type => return from + idx,
            ';' if depth == 0 => return from + idx,
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => {
                depth = depth.saturating_sub(1);
                expect_type = false;
            }
            '=' if chars.peek().is_some_and(|&(_, next)| next == '>') => {
                chars.next();
                expect_type = true;
            }
            ':' | '|' | '&' | ',' | '?' => expect_type = true,
            _ => expect_type = false,
        }
    }
    content.len()
}

struct LineLocator {
    starts: Vec<usize>,
}

impl LineLocator {
    fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { starts }
    }

    /// 1-based line containing a byte offset.
    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}
