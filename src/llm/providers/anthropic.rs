//! Anthropic Messages API provider (`/v1/messages`).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::openai_compatible::check_status;
use crate::llm::{LlmResponse, LlmUsage, ProviderError, non_empty_reply};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
}

impl AnthropicProvider {
    /// The Messages API always needs a key, so a missing one fails at startup.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        max_tokens: u32,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.ok_or_else(|| {
            ProviderError::Request("anthropic provider requires LLM_API_KEY or ANTHROPIC_API_KEY".into())
        })?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, temperature, max_tokens, api_key })
    }

    pub async fn complete(&self, content: &str) -> Result<LlmResponse, ProviderError> {
        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message { role: "user", content }],
        };
        debug!(model = %self.model, content_len = content.len(), "sending anthropic request");

        let response = self
            .client
            .post(&self.api_base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, timeout = e.is_timeout(), "anthropic request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let parsed = response.json::<MessagesResponse>().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        Ok(LlmResponse {
            text: non_empty_reply(Some(parsed.joined_text()))?,
            usage: parsed.usage.map(|u| LlmUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<UsageData>,
}

impl MessagesResponse {
    fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    input_tokens: u64,
    output_tokens: u64,
}
