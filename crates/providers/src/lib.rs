//! Reasoning engine providers for Sleuth.
//!
//! All providers implement the `sleuth_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use sleuth_config::AppConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::Provider;
use std::sync::Arc;

/// Build the configured engine.
///
/// Local endpoints (Ollama, llama.cpp, vLLM on localhost) work without a key;
/// everything else needs `api_key` from the config file or environment.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if is_local(&config.base_url) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(
                "no API key; set SLEUTH_API_KEY or OPENAI_API_KEY, or api_key in config.toml"
                    .into(),
            ));
        }
    };

    let provider = OpenAiCompatProvider::new(&config.provider, &config.base_url, api_key)?;
    Ok(Arc::new(provider))
}

fn is_local(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "localhost" || h == "127.0.0.1"))
        .unwrap_or(false)
}
