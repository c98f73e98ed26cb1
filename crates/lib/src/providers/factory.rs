//! # AI Provider Factory
//!
//! Centralizes the construction of the configured AI provider. Selection
//! happens exactly once, at startup; no call path downstream of the
//! [`AiProvider`] trait knows which adapter it is talking to.

use crate::{
    config::LlmConfig,
    errors::ProviderError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
};
use std::time::Duration;
use tracing::info;

/// Creates the AI provider described by the configuration.
///
/// `provider` values of `"gemini"` build a [`GeminiProvider`] (the API URL
/// is derived from the model name when not given explicitly); anything else
/// is treated as an OpenAI-compatible endpoint and requires `api_url`.
pub fn create_provider(
    config: &LlmConfig,
    timeout: Duration,
) -> Result<Box<dyn AiProvider>, ProviderError> {
    if config.provider == "gemini" {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::Config("api_key must be set for the gemini provider".to_string())
        })?;
        let api_url = config.api_url.clone().unwrap_or_else(|| {
            format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                config.model_name
            )
        });
        info!(%api_url, "configuring Gemini provider");
        Ok(Box::new(GeminiProvider::new(api_url, api_key, timeout)?))
    } else {
        let api_url = config.api_url.clone().ok_or_else(|| {
            ProviderError::Config(format!(
                "api_url must be set for the '{}' provider",
                config.provider
            ))
        })?;
        info!(%api_url, "configuring OpenAI-compatible provider");
        Ok(Box::new(LocalAiProvider::new(
            api_url,
            config.api_key.clone(),
            Some(config.model_name.clone()),
            timeout,
        )?))
    }
}
