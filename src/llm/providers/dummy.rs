//! Dummy LLM provider: echoes input back prefixed with `[echo]`.
//! Used for dry runs of the full pipeline without a model or API key.

use crate::llm::{LlmResponse, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str) -> Result<LlmResponse, ProviderError> {
        Ok(LlmResponse { text: format!("[echo] {content}").trim().to_string(), usage: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_prefixes_echo() {
        let p = DummyProvider;
        assert_eq!(p.complete("hello").await.unwrap().text, "[echo] hello");
    }

    #[tokio::test]
    async fn complete_empty_input() {
        let p = DummyProvider;
        assert_eq!(p.complete("").await.unwrap().text, "[echo]");
    }
}
