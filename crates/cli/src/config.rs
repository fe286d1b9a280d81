use anyhow::{Context as AnyhowContext, Result};
use nucleus_engine::NucleusConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const ENV_PREFIX: &str = "NUCLEUS_";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nucleus").join("config.toml"))
}

/// Defaults, then the TOML file, then `NUCLEUS_*` variables. Command flags
/// are applied by the caller on top.
pub fn load(explicit: Option<&Path>) -> Result<NucleusConfig> {
    let mut config = match explicit {
        Some(path) => read_file(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => read_file(&path)?,
            _ => NucleusConfig::default(),
        },
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<NucleusConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}"))?;
    }
    Ok(())
}

pub fn apply_env(config: &mut NucleusConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    let engine = &mut config.engine;
    parse_var(&lookup, "MAX_TURNS", &mut engine.max_turns)?;
    parse_var(&lookup, "TURN_TIMEOUT_MS", &mut engine.turn_timeout_ms)?;
    parse_var(&lookup, "RESULT_CHAR_LIMIT", &mut engine.result_char_limit)?;
    parse_var(&lookup, "CACHE_CAPACITY", &mut engine.cache_capacity)?;
    parse_var(&lookup, "MAX_GREP_MATCHES", &mut engine.max_grep_matches)?;

    let provider = &mut config.provider;
    parse_var(&lookup, "BASE_URL", &mut provider.base_url)?;
    parse_var(&lookup, "MODEL", &mut provider.model)?;
    parse_var(&lookup, "API_KEY_ENV", &mut provider.api_key_env)?;
    parse_var(&lookup, "TEMPERATURE", &mut provider.temperature)?;
    parse_var(&lookup, "MAX_TOKENS", &mut provider.max_tokens)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn file_values_override_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[engine]\nmax_turns = 4\n\n[provider]\nmodel = \"local-model\"\n",
        )
        .unwrap();

        let config = read_file(&path).unwrap();
        assert_eq!(config.engine.max_turns, 4);
        assert_eq!(config.engine.result_char_limit, 2_000);
        assert_eq!(config.provider.model, "local-model");
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            ("NUCLEUS_MAX_TURNS", "7"),
            ("NUCLEUS_BASE_URL", "http://localhost:11434/v1"),
            ("NUCLEUS_TEMPERATURE", "0.5"),
        ]
        .into_iter()
        .collect();
        let mut config = NucleusConfig::default();
        config.engine.max_turns = 4;
        apply_env(&mut config, |key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.engine.max_turns, 7);
        assert_eq!(config.provider.base_url, "http://localhost:11434/v1");
        assert_eq!(config.provider.temperature, 0.5);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut config = NucleusConfig::default();
        let err = apply_env(&mut config, |key| {
            (key == "NUCLEUS_CACHE_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("NUCLEUS_CACHE_CAPACITY"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        assert!(load(Some(&temp.path().join("absent.toml"))).is_err());
    }
}
