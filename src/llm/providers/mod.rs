//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory: called at startup.
//! Adding a new backend = new module + new match arm.

pub mod anthropic;
pub mod dummy;
pub mod ollama;
pub mod openai_compatible;
#[cfg(test)]
pub mod scripted;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from the environment (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "ollama" => {
            let o = &config.ollama;
            let p = ollama::OllamaProvider::new(
                o.api_base_url.clone(),
                o.model.clone(),
                o.temperature,
                o.timeout_seconds,
            )?;
            Ok(LlmProvider::Ollama(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        "anthropic" => {
            let a = &config.anthropic;
            let p = anthropic::AnthropicProvider::new(
                a.api_base_url.clone(),
                a.model.clone(),
                a.temperature,
                a.timeout_seconds,
                a.max_tokens,
                api_key,
            )?;
            Ok(LlmProvider::Anthropic(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
