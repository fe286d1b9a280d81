use nucleus_snapshot::DocumentStats;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Queries shorter than this may be routed to the search template.
const SHORT_QUERY_CHARS: usize = 50;

/// File paths listed in the system prompt.
const PROMPT_FILE_LIMIT: usize = 50;

pub const FINAL_OPEN: &str = "<<<FINAL>>>";
pub const FINAL_CLOSE: &str = "<<<END>>>";

static COUNTING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(how many|count|total|how much)\b").expect("valid counting pattern")
});
static SEARCH_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(find|search|show|list|where is|locate)\b").expect("valid search pattern")
});
static ARCHITECTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(architecture|overview|structure|structured|design|organi[sz]ed|organi[sz]ation|high[- ]level|components|modules|layers)\b",
    )
    .expect("valid architecture pattern")
});
static IMPLEMENTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(how does|how do|implement\w*|works?|handles?|handling|process\w*|flows?)\b")
        .expect("valid implementation pattern")
});

/// Instruction template chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    Counting,
    Search,
    Architecture,
    Implementation,
    General,
}

impl PromptTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counting => "counting",
            Self::Search => "search",
            Self::Architecture => "architecture",
            Self::Implementation => "implementation",
            Self::General => "general",
        }
    }

    /// Turns the template is allotted before the caller's ceiling applies.
    pub fn budget(&self) -> usize {
        match self {
            Self::Counting => 5,
            Self::Search => 6,
            Self::Architecture | Self::Implementation | Self::General => 12,
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Counting => {
                "The user wants a number. Grep for the construct, count the matches, \
                 filter out false positives if needed, and answer with the count and a \
                 short note on how it was obtained."
            }
            Self::Search => {
                "The user wants to locate something. Grep for likely names, narrow the \
                 matches, and answer with file paths and line numbers."
            }
            Self::Architecture => {
                "The user wants an overview. Start from (files), sample exports and \
                 imports with grep, and describe the main components and how they \
                 depend on each other."
            }
            Self::Implementation => {
                "The user wants to know how something works. Find the entry point with \
                 grep, read surrounding lines with (lines start end), follow calls, and \
                 explain the flow step by step."
            }
            Self::General => {
                "Explore the codebase with grep and related commands until you can \
                 answer the question accurately."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSelection {
    pub template: PromptTemplate,
    pub budget: usize,
}

/// Pick a template from the query text. First rule that matches wins.
pub fn select(query: &str) -> PromptSelection {
    let template = if COUNTING.is_match(query) {
        PromptTemplate::Counting
    } else if query.trim().chars().count() < SHORT_QUERY_CHARS && SEARCH_VERB.is_match(query) {
        PromptTemplate::Search
    } else if ARCHITECTURE.is_match(query) {
        PromptTemplate::Architecture
    } else if IMPLEMENTATION.is_match(query) {
        PromptTemplate::Implementation
    } else {
        PromptTemplate::General
    };
    PromptSelection {
        template,
        budget: template.budget(),
    }
}

/// [`select`] with the template budget capped at `ceiling`.
pub fn select_with_ceiling(query: &str, ceiling: usize) -> PromptSelection {
    let mut selection = select(query);
    selection.budget = selection.budget.min(ceiling);
    selection
}

pub const DSL_REFERENCE: &str = r#"Commands (one per reply, S-expression syntax):
  (grep "pattern" ["flags"])      regex over every line; flags i m s x; at most 1000 matches
                                  each match has: match, line, lineNum, index, groups
  (count x)                       length of a list
  (map x (lambda (m) body))       evaluate body for each element
  (filter x (lambda (m) body))    keep elements where body is truthy
  (first x) / (last x)            first or last element, null when empty
  (take x n)                      first n elements
  (sort x "field")                sort by a field, numbers numerically
  (match value "pattern" [group]) capture group of a regex (0 = whole match) or null
  (lines start end)               lines of the snapshot, 1-based inclusive
  (files)                         file list with path, start and end lines
  (get x "field")                 field of a record or of every element of a list
  (sum x ["field"])               sum of numbers
  (not x)                         boolean negation
Previous results are bound as RESULTS (latest) and _1, _2, ... (by turn)."#;

/// System prompt for one session.
pub fn build_system_prompt<'a>(
    selection: &PromptSelection,
    stats: &DocumentStats,
    files: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut files = files.into_iter();
    let listed: Vec<&str> = files.by_ref().take(PROMPT_FILE_LIMIT).collect();
    let remaining = files.count();

    let mut prompt = String::new();
    prompt.push_str(
        "You analyze a codebase snapshot that is too large to read at once. \
         Explore it with the Nucleus query language, one command per reply.\n\n",
    );
    prompt.push_str(selection.template.instructions());
    prompt.push_str("\n\n");
    prompt.push_str(DSL_REFERENCE);
    prompt.push_str(&format!(
        "\n\nProtocol:\n- Reply with exactly one command to run it; its result comes back in the next message.\n\
         - When you can answer, reply with {FINAL_OPEN}your answer{FINAL_CLOSE} and nothing else.\n\
         - You have at most {} turns.\n\n",
        selection.budget
    ));
    prompt.push_str(&format!(
        "Snapshot: {} lines, {} chars, {} files.\n",
        stats.lines, stats.chars, stats.files
    ));
    if !listed.is_empty() {
        prompt.push_str("Files:\n");
        for file in &listed {
            prompt.push_str("  ");
            prompt.push_str(file);
            prompt.push('\n');
        }
        if remaining > 0 {
            prompt.push_str(&format!("  ... and {remaining} more\n"));
        }
    }
    prompt
}
