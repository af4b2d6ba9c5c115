//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `CLAUSEWATCH_*` env overrides.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `LlmConfig`, …).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{Overrides, expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests: dummy LLM, no API keys, everything under `work_dir`.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            watcher: WatcherConfig {
                uploads_dir: work_dir.join("uploads"),
                settle_ms: 0,
                scan_existing: false,
            },
            analysis: AnalysisConfig {
                output_dir: work_dir.join("analysis"),
                prompts_dir: work_dir.join("prompts"),
                key_clauses: raw::default_key_clauses(),
                max_contract_chars: 0,
            },
            store: StoreConfig {
                backend: "sqlite".into(),
                dir: work_dir.join("vectorstore"),
                chunk_size: 200,
                chunk_overlap: 40,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                ollama: OllamaConfig {
                    api_base_url: "http://localhost:0/api/generate".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
                anthropic: AnthropicConfig {
                    api_base_url: "http://localhost:0/v1/messages".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                    max_tokens: 256,
                },
            },
            llm_api_key: None,
        }
    }
}
