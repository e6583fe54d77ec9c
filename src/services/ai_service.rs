use std::sync::Arc;

use crate::config::{Config, ProviderKind};
use crate::models::FoodInput;
use crate::services::{GeminiService, OpenAiService};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} is not set")]
    MissingApiKey(&'static str),

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} returned an unusable response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

/// Trait for nutrition inference backends (Gemini, OpenAI, ...)
#[async_trait::async_trait]
pub trait NutritionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// One completion for `input` under `prompt`; returns the model's text.
    async fn analyze(&self, input: &FoodInput, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the provider selected by `AI_PROVIDER`.
pub fn create_provider(config: &Config) -> Arc<dyn NutritionProvider> {
    match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiService::new(
            config.gemini.api_key.clone(),
            config.gemini.model.clone(),
            config.gemini.base_url.clone(),
        )),
        ProviderKind::OpenAi => Arc::new(OpenAiService::new(
            config.openai.api_key.clone(),
            config.openai.model.clone(),
            config.openai.base_url.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_picks_configured_provider() {
        let mut config = Config::default();
        assert_eq!(create_provider(&config).name(), "gemini");

        config.provider = ProviderKind::OpenAi;
        config.openai.model = "gpt-4o-mini".to_string();
        let provider = create_provider(&config);
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_missing_key_message_names_variable() {
        let err = ProviderError::MissingApiKey("GEMINI_API_KEY");
        assert_eq!(err.to_string(), "GEMINI_API_KEY is not set");
    }
}
