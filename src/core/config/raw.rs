//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub general: RawGeneral,
    #[serde(default)]
    pub watcher: RawWatcher,
    #[serde(default)]
    pub analysis: RawAnalysis,
    #[serde(default)]
    pub store: RawStore,
    #[serde(default)]
    pub llm: RawLlm,
}

#[derive(Deserialize)]
pub(super) struct RawGeneral {
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawGeneral {
    fn default() -> Self {
        Self { work_dir: default_work_dir(), log_level: default_log_level(), log_file: None }
    }
}

// ── Watcher ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawWatcher {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub scan_existing: bool,
}

impl Default for RawWatcher {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            settle_ms: default_settle_ms(),
            scan_existing: false,
        }
    }
}

// ── Analysis ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawAnalysis {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    #[serde(default = "default_key_clauses")]
    pub key_clauses: Vec<String>,
    #[serde(default)]
    pub max_contract_chars: usize,
}

impl Default for RawAnalysis {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            prompts_dir: default_prompts_dir(),
            key_clauses: default_key_clauses(),
            max_contract_chars: 0,
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_dir")]
    pub dir: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            dir: default_store_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub ollama: RawOllamaConfig,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
    #[serde(default)]
    pub anthropic: RawAnthropicConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            ollama: RawOllamaConfig::default(),
            openai: RawOpenAiConfig::default(),
            anthropic: RawAnthropicConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOllamaConfig {
    #[serde(default = "default_ollama_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_ollama_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOllamaConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_ollama_api_base_url(),
            model: default_ollama_model(),
            temperature: 0.0,
            timeout_seconds: default_ollama_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_remote_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: 0.0,
            timeout_seconds: default_remote_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawAnthropicConfig {
    #[serde(default = "default_anthropic_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_remote_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,
}

impl Default for RawAnthropicConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_anthropic_api_base_url(),
            model: default_anthropic_model(),
            temperature: 0.0,
            timeout_seconds: default_remote_timeout_seconds(),
            max_tokens: default_anthropic_max_tokens(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_work_dir() -> String { "data".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }
pub(super) fn default_uploads_dir() -> String { "uploads".to_string() }
pub(super) fn default_settle_ms() -> u64 { 500 }
pub(super) fn default_output_dir() -> String { "analysis".to_string() }
pub(super) fn default_prompts_dir() -> String { "config/prompts".to_string() }
pub(super) fn default_key_clauses() -> Vec<String> {
    ["Termination", "Indemnity", "Confidentiality"].iter().map(|s| s.to_string()).collect()
}
pub(super) fn default_store_backend() -> String { "sqlite".to_string() }
pub(super) fn default_store_dir() -> String { "vectorstore".to_string() }
pub(super) fn default_chunk_size() -> usize { 1000 }
pub(super) fn default_chunk_overlap() -> usize { 200 }
pub(super) fn default_llm_provider() -> String { "ollama".to_string() }
pub(super) fn default_ollama_api_base_url() -> String { "http://localhost:11434/api/generate".to_string() }
pub(super) fn default_ollama_model() -> String { "llama3".to_string() }
pub(super) fn default_ollama_timeout_seconds() -> u64 { 300 }
pub(super) fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
pub(super) fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
pub(super) fn default_anthropic_api_base_url() -> String { "https://api.anthropic.com/v1/messages".to_string() }
pub(super) fn default_anthropic_model() -> String { "claude-3-opus-20240229".to_string() }
pub(super) fn default_anthropic_max_tokens() -> u32 { 1024 }
pub(super) fn default_remote_timeout_seconds() -> u64 { 120 }
