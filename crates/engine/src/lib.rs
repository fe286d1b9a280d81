//! # Nucleus Engine
//!
//! Recursive analysis: a completion provider plans, the Nucleus interpreter
//! executes, and the orchestrator keeps the two in a bounded turn loop.
//!
//! ```text
//! query ──> Prompt Selector ──> (template, budget)
//!                                   │
//!   ┌───────────── turn loop ───────┴──────────────┐
//!   │ provider.complete(history)                   │
//!   │   ├─ <<<FINAL>>>…<<<END>>>  ─> Done(success)  │
//!   │   ├─ command ─> Interpreter ─> RESULTS, _N   │
//!   │   └─ neither ─> corrective message           │
//!   └──────────────────────────────────────────────┘
//!         budget spent ─> forced final request
//! ```

pub mod config;
mod engine;
mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
mod structural;

pub use config::{EngineConfig, NucleusConfig, ProviderConfig};
pub use engine::Engine;
pub use error::{AnalyzeError, Result};
pub use orchestrator::{
    analyze_document, extract_final_answer, AnalysisResult, AnalyzeOptions, ProgressCallback,
    TurnAction, TurnRecord, MAX_TURNS_REACHED,
};
pub use prompt::{select, select_with_ceiling, PromptSelection, PromptTemplate};
pub use provider::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderError,
    ProviderResult, Role, Usage,
};
pub use structural::StructuralQueries;
