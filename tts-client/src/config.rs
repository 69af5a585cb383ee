use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, TtsError};

/// Default Gemini speech model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider used when none is requested explicitly
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model identifier used when none is requested explicitly
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Provider-specific configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home =
            std::env::var("HOME").map_err(|_| TtsError::ConfigError("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/cli-programs/tts.toml"))
    }

    /// Get provider config by provider name
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            providers: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key: Some("secret".to_string()),
                base_url: None,
            },
        );
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(
            parsed.get_provider_config("gemini").unwrap().api_key.as_deref(),
            Some("secret")
        );
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[providers.gemini]
base_url = "http://localhost:9000"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_provider, "gemini");
        let gemini = config.get_provider_config("gemini").unwrap();
        assert!(gemini.api_key.is_none());
        assert_eq!(gemini.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path().unwrap();
        assert!(
            path.to_string_lossy()
                .contains(".config/cli-programs/tts.toml")
        );
    }
}
