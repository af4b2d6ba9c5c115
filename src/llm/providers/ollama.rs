//! Ollama native generate provider (`/api/generate`, non-streaming).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::openai_compatible::check_status;
use crate::llm::{LlmResponse, LlmUsage, ProviderError, non_empty_reply};

/// Local Ollama server adapter. Keyless by default.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, temperature })
    }

    pub async fn complete(&self, prompt: &str) -> Result<LlmResponse, ProviderError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        debug!(model = %self.model, content_len = prompt.len(), "sending ollama request");

        let response = self
            .client
            .post(&self.api_base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "ollama request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let parsed = response.json::<GenerateResponse>().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (input, output) => Some(LlmUsage {
                input_tokens: input.unwrap_or(0),
                output_tokens: output.unwrap_or(0),
            }),
        };
        Ok(LlmResponse { text: non_empty_reply(parsed.response)?, usage })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}
