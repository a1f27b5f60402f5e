//! # AI Provider Factory
//!
//! This module centralizes the logic for turning a `ProviderConfig` into a live
//! AI provider, so the CLI and the tests build providers the same way.

use crate::{
    errors::PromptError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
    types::ProviderConfig,
};
use tracing::info;

/// Creates an AI provider instance from its configuration.
///
/// Gemini providers derive their URL from the model name unless `api_url` is
/// set explicitly and require an API key. Local providers require `api_url`.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn AiProvider>, PromptError> {
    info!(
        "Creating '{}' provider for model '{}'",
        config.provider, config.model_name
    );

    match config.provider.as_str() {
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    PromptError::MissingAiProvider(format!(
                        "an api_key is required for the gemini provider (model '{}')",
                        config.model_name
                    ))
                })?;
            let api_url = config
                .api_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| GeminiProvider::model_url(&config.model_name));
            Ok(Box::new(GeminiProvider::new(api_url, api_key)?))
        }
        "local" => {
            let api_url = config
                .api_url
                .clone()
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    PromptError::MissingAiProvider(
                        "api_url is not set for the local provider. Please set LOCAL_AI_API_URL in your .env file."
                            .to_string(),
                    )
                })?;
            Ok(Box::new(LocalAiProvider::new(
                api_url,
                config.api_key.clone().filter(|key| !key.is_empty()),
                Some(config.model_name.clone()).filter(|model| !model.is_empty()),
            )?))
        }
        other => Err(PromptError::MissingAiProvider(format!(
            "unsupported provider type '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, api_url: Option<&str>, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            api_url: api_url.map(String::from),
            api_key: api_key.map(String::from),
            model_name: "gemini-2.5-flash".to_string(),
        }
    }

    #[test]
    fn gemini_without_key_is_rejected() {
        let err = create_provider(&config("gemini", None, None)).unwrap_err();
        assert!(matches!(err, PromptError::MissingAiProvider(_)));
    }

    #[test]
    fn local_without_url_is_rejected() {
        let err = create_provider(&config("local", Some(""), None)).unwrap_err();
        assert!(matches!(err, PromptError::MissingAiProvider(_)));
    }

    #[test]
    fn unknown_provider_type_is_rejected() {
        let err = create_provider(&config("carrier-pigeon", None, None)).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn gemini_url_is_derived_from_model_name() {
        assert_eq!(
            GeminiProvider::model_url("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(create_provider(&config("gemini", None, Some("key"))).is_ok());
    }
}
