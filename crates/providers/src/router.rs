//! Provider selection: builds the configured LLM backend.

use crate::openai_compat::OpenAiCompatProvider;
use heimdall_core::error::ProviderError;
use heimdall_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// Build the active provider from configuration.
///
/// `[providers.<name>].api_url` overrides the well-known endpoint, which
/// makes any OpenAI-compatible server usable under a custom name.
pub fn build_from_config(
    config: &heimdall_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| default_base_url(name).map(String::from))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}'; set [providers.{name}].api_url"
            ))
        })?;

    let api_key = match config.provider_api_key() {
        Some(key) => key,
        None if requires_key(name) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for '{name}'; set HEIMDALL_API_KEY or the provider's key variable"
            )));
        }
        None => String::new(),
    };

    info!(provider = name, base_url = %base_url, "Using provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "gemini" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

fn requires_key(provider_name: &str) -> bool {
    matches!(provider_name, "openai" | "gemini" | "mistral")
}
