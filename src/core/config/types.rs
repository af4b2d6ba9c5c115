//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the pipeline consumes.
//! Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── Watcher ─────────────────────────────────────────────────────────────────

/// Upload directory watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory monitored for new contracts (resolved against `work_dir`).
    pub uploads_dir: PathBuf,
    /// Delay between a creation event and processing, in milliseconds.
    pub settle_ms: u64,
    /// Queue files already present in `uploads_dir` at startup.
    pub scan_existing: bool,
}

// ── Analysis ────────────────────────────────────────────────────────────────

/// Analysis agent and JSON output configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Directory receiving `<doc_id>.json` analyses.
    pub output_dir: PathBuf,
    /// Directory holding prompt template overrides.
    pub prompts_dir: PathBuf,
    /// Clauses extracted and risk-scored for every contract, in order.
    pub key_clauses: Vec<String>,
    /// Upper bound on contract characters sent per prompt; `0` = unlimited.
    pub max_contract_chars: usize,
}

// ── Chunk store ─────────────────────────────────────────────────────────────

/// Chunk index configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Index backend name. Only `"sqlite"` is available.
    pub backend: String,
    pub dir: PathBuf,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// Ollama native API configuration (`[llm.ollama]`).
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full `/api/generate` endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Anthropic Messages API configuration (`[llm.anthropic]`).
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Full `/v1/messages` endpoint URL.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Required by the Messages API.
    pub max_tokens: u32,
}

/// LLM back-end configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"ollama"`, `"openai"`, `"anthropic"`, `"dummy"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
}

impl LlmConfig {
    /// Model name of the active provider, for logs and analysis metadata.
    pub fn active_model(&self) -> &str {
        match self.provider.as_str() {
            "openai" | "openai-compatible" => &self.openai.model,
            "anthropic" => &self.anthropic.model,
            "dummy" => "echo",
            _ => &self.ollama.model,
        }
    }
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub watcher: WatcherConfig,
    pub analysis: AnalysisConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` (or the provider-specific variable).
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
}
