use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod paths;

pub use paths::{join_rel_path, normalize_rel_path, parent_dir};

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTruncation {
    MaxChars,
    MaxMatches,
    MaxTurns,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Envelope every JSON-emitting command writes to stdout.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolResponse<T> {
    pub schema_version: u32,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncation: Vec<BudgetTruncation>,
}

impl<T> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            schema_version: OUTPUT_SCHEMA_VERSION,
            status: ResponseStatus::Ok,
            data: Some(data),
            error: None,
            truncation: Vec::new(),
        }
    }

    pub fn error(error: ErrorEnvelope) -> Self {
        Self {
            schema_version: OUTPUT_SCHEMA_VERSION,
            status: ResponseStatus::Error,
            data: None,
            error: Some(error),
            truncation: Vec::new(),
        }
    }

    pub fn truncated(mut self, reason: BudgetTruncation) -> Self {
        if !self.truncation.contains(&reason) {
            self.truncation.push(reason);
        }
        self
    }
}

/// Cut `input` to at most `max_chars` characters on a char boundary.
pub fn truncate_to_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Cut `input` to `max_chars` characters and append a marker naming the
/// original size when anything was dropped.
pub fn truncate_with_marker(input: &str, max_chars: usize) -> (String, bool) {
    let kept = truncate_to_chars(input, max_chars);
    if kept.len() == input.len() {
        return (input.to_string(), false);
    }
    let total = input.chars().count();
    (
        format!("{kept}\n... [truncated: showing {max_chars} of {total} chars]"),
        true,
    )
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_chars("héllo", 2), "hé");
        assert_eq!(truncate_to_chars("abc", 10), "abc");
    }

    #[test]
    fn marker_is_only_added_when_cut() {
        let (short, cut) = truncate_with_marker("abc", 3);
        assert_eq!(short, "abc");
        assert!(!cut);

        let (long, cut) = truncate_with_marker("abcdef", 3);
        assert!(cut);
        assert!(long.starts_with("abc\n... [truncated"));
        assert!(long.contains("of 6 chars"));
    }

    #[test]
    fn error_response_omits_data() {
        let resp: ToolResponse<()> = ToolResponse::error(ErrorEnvelope::new("not_found", "x"));
        let raw = serialize_json(&resp).unwrap();
        assert!(raw.contains("\"status\":\"error\""));
        assert!(!raw.contains("\"data\""));
    }
}
