use thiserror::Error;

pub type Result<T> = std::result::Result<T, DslError>;

/// Errors raised while parsing or evaluating a Nucleus command.
///
/// All of them are recoverable: the orchestrator feeds the message back into
/// the conversation as the turn's result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DslError {
    #[error("Parse error at {position}: {message}")]
    ParseError { position: usize, message: String },

    #[error("Unknown operator: {op}")]
    UnknownOperator { op: String },

    #[error("{op}: expected (lambda (param) body), got {found}")]
    LambdaShape { op: String, found: String },

    #[error("{op}: expected {expected}, got {got} argument(s)")]
    Arity {
        op: String,
        expected: &'static str,
        got: usize,
    },

    #[error("{op}: invalid pattern: {message}")]
    InvalidPattern { op: String, message: String },

    #[error("{op}: {message}")]
    TypeError { op: String, message: String },
}

impl DslError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            position,
            message: message.into(),
        }
    }

    pub fn type_error(op: &str, message: impl Into<String>) -> Self {
        Self::TypeError {
            op: op.to_string(),
            message: message.into(),
        }
    }

    /// Operator the error is about, if any.
    pub fn operator(&self) -> Option<&str> {
        match self {
            Self::ParseError { .. } => None,
            Self::UnknownOperator { op }
            | Self::LambdaShape { op, .. }
            | Self::Arity { op, .. }
            | Self::InvalidPattern { op, .. }
            | Self::TypeError { op, .. } => Some(op),
        }
    }
}
