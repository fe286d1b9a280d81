use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs for analysis sessions and the shared document cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling on turns; the prompt template's budget may be lower
    pub max_turns: usize,
    /// Per provider call; 0 disables the timeout
    pub turn_timeout_ms: u64,
    /// Serialized command results are cut to this many chars
    pub result_char_limit: usize,
    pub cache_capacity: usize,
    pub max_grep_matches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 12,
            turn_timeout_ms: 120_000,
            result_char_limit: 2_000,
            cache_capacity: nucleus_snapshot::DEFAULT_CACHE_CAPACITY,
            max_grep_matches: nucleus_dsl::DEFAULT_MAX_MATCHES,
        }
    }
}

impl EngineConfig {
    pub fn turn_timeout(&self) -> Option<Duration> {
        (self.turn_timeout_ms > 0).then(|| Duration::from_millis(self.turn_timeout_ms))
    }
}

/// Connection settings for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 2_048,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NucleusConfig {
    pub engine: EngineConfig,
    pub provider: ProviderConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_turns, 12);
        assert_eq!(config.result_char_limit, 2_000);
        assert_eq!(config.max_grep_matches, 1_000);
        assert_eq!(config.turn_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = EngineConfig {
            turn_timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.turn_timeout(), None);
    }
}
