//! Abstract chat completion capability the orchestrator talks to.
//!
//! Concrete HTTP clients live outside the engine; tests plug in scripted
//! providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure before a response arrived.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Auth error: {message}")]
    Auth { message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// No completion within the per-turn limit.
    #[error("Provider call timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response arrived but had no usable content.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl ProviderError {
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "network",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "api",
            Self::Timeout { .. } => "timeout",
            Self::InvalidResponse { .. } => "parse",
            Self::Other { .. } => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: None,
            usage: None,
        }
    }
}

/// One-shot chat completion over the full message history.
///
/// Implementors must be `Send + Sync`; independent sessions may share one
/// provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier used in logs, e.g. `"openai"`.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<Completion>;
}
