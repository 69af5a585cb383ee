//! Speech provider implementations

mod gemini;
pub mod mock;
mod sse;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, TtsError};
use crate::provider::SpeechProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(TtsError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Environment variables checked, in order, for this provider's API key
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
        }
    }
}

/// Create a provider instance for a model and optional config
pub fn get_provider(
    provider: &str,
    model: &str,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn SpeechProvider>> {
    let kind = ProviderKind::from_str(provider)?;

    match kind {
        ProviderKind::Gemini => {
            let api_key = get_api_key(provider_config, kind)?;
            let base_url = provider_config.and_then(|c| c.base_url.as_deref());
            Ok(Box::new(GeminiProvider::new(model, api_key, base_url)?))
        }
    }
}

/// Get API key from config or environment variables
fn get_api_key(config: Option<&ProviderConfig>, kind: ProviderKind) -> Result<String> {
    // Check config first
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        return Ok(key);
    }

    for env_var in kind.env_vars() {
        if let Ok(key) = std::env::var(env_var) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }
    }

    Err(TtsError::MissingApiKey {
        provider: kind.display_name().to_string(),
        env_var: kind.env_vars().join(" or "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!(ProviderKind::from_str("gemini").unwrap(), ProviderKind::Gemini);
        assert_eq!(ProviderKind::from_str("Google").unwrap(), ProviderKind::Gemini);
        assert!(ProviderKind::from_str("polly").is_err());
    }

    #[test]
    fn test_api_key_from_config_wins() {
        let config = ProviderConfig {
            api_key: Some("from-config".to_string()),
            base_url: None,
        };
        let key = get_api_key(Some(&config), ProviderKind::Gemini).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_get_provider_with_configured_key() {
        let config = ProviderConfig {
            api_key: Some("key".to_string()),
            base_url: Some("http://localhost:1".to_string()),
        };
        let provider = get_provider("gemini", "gemini-2.5-pro-preview-tts", Some(&config)).unwrap();
        assert_eq!(provider.name(), "Gemini");
        assert_eq!(provider.model(), "gemini-2.5-pro-preview-tts");
    }
}
