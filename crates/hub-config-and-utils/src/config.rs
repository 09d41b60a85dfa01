//! Configuration management for the hub.
//!
//! Precedence, lowest first: built-in defaults, `config.json`, environment.
//! Command-line flags are applied on top by the binary.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Endpoint answering `{"url": "<agent service base address>"}`.
pub const DEFAULT_DISCOVERY_URL: &str = "http://127.0.0.1:4096/discovery";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_LOG_LEVEL: &str = "AGENT_HUB_LOG_LEVEL";
pub const ENV_DISCOVERY_URL: &str = "AGENT_HUB_DISCOVERY_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AGENT_HUB_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
    /// Bound on every HTTP call, discovery included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_discovery_url() -> String {
    DEFAULT_DISCOVERY_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            discovery_url: default_discovery_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load `config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from variables looked up through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> CoreResult<()> {
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(non_empty) {
            self.log_level = level;
        }
        if let Some(url) = lookup(ENV_DISCOVERY_URL).and_then(non_empty) {
            self.discovery_url = url;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS).and_then(non_empty) {
            self.request_timeout_secs = raw.parse().map_err(|_| {
                CoreError::Config(format!("{} must be a whole number: {}", ENV_REQUEST_TIMEOUT_SECS, raw))
            })?;
        }
        Ok(())
    }

    pub fn discovery_url(&self) -> CoreResult<Url> {
        Url::parse(&self.discovery_url).map_err(CoreError::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.discovery_url, DEFAULT_DISCOVERY_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.discovery_url, DEFAULT_DISCOVERY_URL);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            discovery_url: "http://10.0.0.5:9000/discovery".to_string(),
            request_timeout_secs: 5,
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                (ENV_LOG_LEVEL, "warn"),
                (ENV_DISCOVERY_URL, " http://h:1/d "),
                (ENV_REQUEST_TIMEOUT_SECS, "12"),
            ]))
            .unwrap();

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.discovery_url, "http://h:1/d");
        assert_eq!(config.request_timeout_secs, 12);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_LOG_LEVEL, "  ")])).unwrap();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_bad_timeout_is_a_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_discovery_url_parse() {
        let mut config = Config::default();
        assert_eq!(config.discovery_url().unwrap().scheme(), "http");

        config.discovery_url = "not a url".to_string();
        assert!(config.discovery_url().is_err());
    }
}
