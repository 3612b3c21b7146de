//! Service configuration.
//!
//! Everything comes from the process environment (after `.env` has been
//! loaded by `main`). Numeric values that fail to parse are startup errors.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GENERATION_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_DASHBOARDS: usize = 1000;

/// Runtime configuration for the dashboard engine service.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub port: u16,
    /// `None` disables generation; every dashboard then comes from the fallback builder.
    pub openrouter_api_key: Option<String>,
    /// Overrides the OpenRouter chat-completions URL.
    pub openrouter_url: Option<String>,
    pub model: String,
    pub fetch_timeout: Duration,
    pub generation_attempts: u32,
    /// Stored dashboards kept before the oldest is evicted.
    pub max_dashboards: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            openrouter_api_key: None,
            openrouter_url: None,
            model: DEFAULT_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            generation_attempts: DEFAULT_GENERATION_ATTEMPTS,
            max_dashboards: DEFAULT_MAX_DASHBOARDS,
        }
    }
}

impl EngineConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid PORT: {}", v))?,
            None => defaults.port,
        };

        let fetch_timeout = match var("GENDASH_FETCH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("Invalid GENDASH_FETCH_TIMEOUT_SECS: {}", v))?,
            ),
            None => defaults.fetch_timeout,
        };

        let generation_attempts = match var("GENDASH_GENERATION_ATTEMPTS") {
            Some(v) => {
                let attempts: u32 = v
                    .parse()
                    .with_context(|| format!("Invalid GENDASH_GENERATION_ATTEMPTS: {}", v))?;
                if attempts == 0 {
                    anyhow::bail!("GENDASH_GENERATION_ATTEMPTS must be at least 1");
                }
                attempts
            }
            None => defaults.generation_attempts,
        };

        let max_dashboards = match var("GENDASH_MAX_DASHBOARDS") {
            Some(v) => {
                let max: usize = v
                    .parse()
                    .with_context(|| format!("Invalid GENDASH_MAX_DASHBOARDS: {}", v))?;
                if max == 0 {
                    anyhow::bail!("GENDASH_MAX_DASHBOARDS must be at least 1");
                }
                max
            }
            None => defaults.max_dashboards,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            openrouter_url: var("OPENROUTER_API_URL"),
            model: var("GENDASH_MODEL").unwrap_or(defaults.model),
            fetch_timeout,
            generation_attempts,
            max_dashboards,
        })
    }

    /// `host:port` to bind the listener to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert!(config.openrouter_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "9000"),
            ("BIND_ADDR", "127.0.0.1"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("OPENROUTER_API_URL", "http://localhost:4000/v1/chat/completions"),
            ("GENDASH_MODEL", "openai/gpt-4o-mini"),
            ("GENDASH_FETCH_TIMEOUT_SECS", "5"),
            ("GENDASH_GENERATION_ATTEMPTS", "1"),
            ("GENDASH_MAX_DASHBOARDS", "50"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.openrouter_url.as_deref(),
            Some("http://localhost:4000/v1/chat/completions")
        );
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.generation_attempts, 1);
        assert_eq!(config.max_dashboards, 50);
    }

    #[test]
    fn test_blank_key_disables_generation() {
        let config = load(&[("OPENROUTER_API_KEY", "   ")]).unwrap();
        assert!(config.openrouter_api_key.is_none());
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("GENDASH_FETCH_TIMEOUT_SECS", "-1")]).is_err());
        assert!(load(&[("GENDASH_GENERATION_ATTEMPTS", "0")]).is_err());
        assert!(load(&[("GENDASH_MAX_DASHBOARDS", "0")]).is_err());
    }
}
