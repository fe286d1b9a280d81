use serde::{Deserialize, Serialize};

/// Extensions the extractor understands.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

pub fn is_supported_source(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// One import statement found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    /// Importing file
    pub source: String,

    /// Specifier exactly as written (`./b`, `lodash`)
    pub target_spec: String,

    /// Snapshot file the specifier resolved to, if any
    pub resolved: Option<String>,

    /// Imported names (original names, not local aliases)
    pub symbols: Vec<String>,

    pub is_default: bool,
    pub is_type: bool,

    /// 1-based line within the importing file
    pub line: usize,
}

impl ImportEdge {
    pub fn is_relative(&self) -> bool {
        is_relative_spec(&self.target_spec)
    }
}

pub fn is_relative_spec(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Function,
    Class,
    Const,
    Type,
    Interface,
    Enum,
    Default,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Const => "const",
            Self::Type => "type",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Default => "default",
        }
    }
}

/// One exported declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub file: String,
    pub symbol: String,
    pub kind: ExportKind,

    /// Declaration head for functions, e.g. `function foo(a: string): void`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// 1-based line within the exporting file
    pub line: usize,
}
