//! Scripted provider for unit tests: replies are picked by prompt substring
//! and every prompt is recorded.

use std::sync::{Arc, Mutex};

use crate::llm::{LlmResponse, LlmUsage, ProviderError};

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    rules: Arc<Vec<(String, Result<String, String>)>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    /// First rule whose needle occurs in the prompt wins. `Err` rules fail the call.
    pub fn new(rules: Vec<(&str, Result<&str, &str>)>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(needle, reply)| {
                (needle.to_string(), reply.map(str::to_string).map_err(str::to_string))
            })
            .collect();
        Self { rules: Arc::new(rules), calls: Arc::default() }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn complete(&self, prompt: &str) -> Result<LlmResponse, ProviderError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Err(format!("no scripted reply for prompt: {prompt}")));
        match reply {
            Ok(text) => Ok(LlmResponse {
                text,
                usage: Some(LlmUsage { input_tokens: 10, output_tokens: 2 }),
            }),
            Err(msg) => Err(ProviderError::Request(msg)),
        }
    }
}
