//! Nucleus: a small S-expression query language over a snapshot's lines.
//!
//! ```text
//! source ──parse──▶ Expr ──Interpreter::eval──▶ Value
//!                              │
//!                    Scope (lambda frames) ─▶ Bindings (RESULTS, _1, _2, …)
//! ```
//!
//! Commands are side-effect free: the same document and command sequence
//! always produce the same values. [`extract_command`] pulls the first
//! command out of free-form model output.

pub mod env;
pub mod error;
pub mod extract;
pub mod interpreter;
pub mod parser;
pub mod value;

pub use env::{Bindings, Scope};
pub use error::{DslError, Result};
pub use extract::extract_command;
pub use interpreter::{Interpreter, DEFAULT_MAX_MATCHES, OPERATORS};
pub use parser::{parse, Expr, MAX_DEPTH};
pub use value::Value;
