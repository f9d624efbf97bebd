//! Build the oracle and perception backends from configuration.

use despensa_config::AppConfig;
use despensa_core::error::ProviderError;
use despensa_core::perception::Perception;
use despensa_core::provider::Provider;
use std::sync::Arc;

use crate::openai_compat::OpenAiCompatProvider;
use crate::openai_perception::OpenAiPerception;

/// The external collaborators an agent needs.
pub struct Backends {
    pub oracle: Arc<dyn Provider>,
    pub perception: Arc<dyn Perception>,
}

/// Build both backends. Fails when no API key is configured.
pub fn build_from_config(config: &AppConfig) -> Result<Backends, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key (set DESPENSA_API_KEY or OPENAI_API_KEY, or api_key in config.toml)".into(),
        )
    })?;

    let oracle = OpenAiCompatProvider::new(provider_name(&config.api_url), &config.api_url, &api_key);

    let perception = OpenAiPerception::new(&config.api_url, &api_key)
        .with_transcription_model(&config.perception.transcription_model)
        .with_vision_model(&config.perception.vision_model, config.perception.vision_max_tokens);

    Ok(Backends {
        oracle: Arc::new(oracle),
        perception: Arc::new(perception),
    })
}

/// Derive a provider label from its base URL.
fn provider_name(api_url: &str) -> &'static str {
    if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn builds_openai_backends() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let backends = build_from_config(&config).unwrap();
        assert_eq!(backends.oracle.name(), "openai");
        assert_eq!(backends.perception.name(), "openai");
    }

    #[test]
    fn provider_names_from_url() {
        assert_eq!(provider_name("https://openrouter.ai/api/v1"), "openrouter");
        assert_eq!(provider_name("http://localhost:11434/v1"), "ollama");
        assert_eq!(provider_name("https://llm.internal/v1"), "custom");
    }
}
