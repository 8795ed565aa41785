//! Configuration loader for Parley.
//!
//! Reads `parley.toml` and deserializes it into [`ParleyConfig`], falling
//! back to defaults when the file is missing or malformed. Environment
//! variables then override individual settings.

use std::path::Path;
use std::str::FromStr;

use parley_types::config::ParleyConfig;
use parley_types::error::ConfigError;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

/// Configuration plus any problems met while reading it.
///
/// The loader runs before tracing is installed, so warnings are handed back
/// for the caller to log once a subscriber exists.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ParleyConfig,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    fn defaults(warning: Option<String>) -> Self {
        Self {
            config: ParleyConfig::default(),
            warnings: warning.into_iter().collect(),
        }
    }
}

/// Load configuration from `path`.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: a warning, then defaults.
pub async fn load_config(path: &Path) -> LoadedConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return LoadedConfig::defaults(None);
        }
        Err(err) => {
            return LoadedConfig::defaults(Some(format!(
                "Failed to read {}: {err}, using defaults",
                path.display()
            )));
        }
    };

    match toml::from_str::<ParleyConfig>(&content) {
        Ok(config) => LoadedConfig {
            config,
            warnings: Vec::new(),
        },
        Err(err) => LoadedConfig::defaults(Some(format!(
            "Failed to parse {}: {err}, using defaults",
            path.display()
        ))),
    }
}

/// Apply `PARLEY_*` and `OPENAI_API_KEY` overrides using `lookup` to read
/// variables. Empty values are ignored.
pub fn apply_env_overrides(
    config: &mut ParleyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(model) = var("PARLEY_MODEL") {
        config.model = model;
    }
    if let Some(v) = var("PARLEY_SESSION_TTL_SECS") {
        config.session_ttl_secs = parse("PARLEY_SESSION_TTL_SECS", &v)?;
    }
    if let Some(v) = var("PARLEY_CONTEXT_BUDGET") {
        config.context_budget = parse("PARLEY_CONTEXT_BUDGET", &v)?;
    }
    if let Some(v) = var("PARLEY_MAX_SESSIONS") {
        config.max_sessions = parse("PARLEY_MAX_SESSIONS", &v)?;
    }
    if let Some(v) = var("PARLEY_MAX_MESSAGE_LENGTH") {
        config.max_message_length = parse("PARLEY_MAX_MESSAGE_LENGTH", &v)?;
    }
    if let Some(host) = var("PARLEY_HOST") {
        config.server.host = host;
    }
    if let Some(v) = var("PARLEY_PORT") {
        config.server.port = parse("PARLEY_PORT", &v)?;
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        config.provider.api_key = Some(key);
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("'{value}': {e}"),
    })
}

/// Load the file, apply process environment overrides, and validate.
pub async fn resolve_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let mut loaded = load_config(path).await;
    apply_env_overrides(&mut loaded.config, |name| std::env::var(name).ok())?;
    loaded.config.validate()?;
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let loaded = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE)).await;
        assert_eq!(loaded.config.model, "gpt-3.5-turbo");
        assert_eq!(loaded.config.max_sessions, 10_000);
        assert!(loaded.warnings.is_empty());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(
            &path,
            r#"
model = "gpt-4o-mini"
context_budget = 4000
system_prompt = "You are a concise assistant."

[provider]
kind = "echo"

[server]
port = 8080
frontend_url = "https://chat.example.com"
"#,
        )
        .await
        .unwrap();

        let loaded = load_config(&path).await;
        assert!(loaded.warnings.is_empty());
        let config = loaded.config;
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.context_budget, 4000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.frontend_url, "https://chat.example.com");
        assert!(config.system_prompt.is_some());
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let loaded = load_config(&path).await;
        assert_eq!(loaded.config.context_budget, 12_000);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].starts_with("Failed to parse"));
        assert!(loaded.warnings[0].contains(DEFAULT_CONFIG_FILE));
    }

    #[tokio::test]
    async fn resolve_config_carries_parse_warning() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        tokio::fs::write(&path, "model = ").await.unwrap();

        let loaded = resolve_config(&path).await.unwrap();
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = ParleyConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PARLEY_MODEL", "gpt-4o"),
                ("PARLEY_SESSION_TTL_SECS", "600"),
                ("PARLEY_PORT", "9001"),
                ("PARLEY_HOST", "127.0.0.1"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = ParleyConfig::default();
        apply_env_overrides(&mut config, env(&[("PARLEY_MODEL", "  ")])).unwrap();
        assert_eq!(config.model, "gpt-3.5-turbo");
    }

    #[test]
    fn malformed_env_number_is_an_error() {
        let mut config = ParleyConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PARLEY_MAX_SESSIONS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("PARLEY_MAX_SESSIONS"));
    }
}
