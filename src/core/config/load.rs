//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `CLAUSEWATCH_WORK_DIR`, `CLAUSEWATCH_LOG_LEVEL` and
//! `CLAUSEWATCH_LLM_PROVIDER` env overrides. `LLM_PROVIDER` is read when the
//! prefixed provider variable is unset.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

use super::raw::RawConfig;
use super::types::*;

/// Env-sourced values that win over the TOML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build overrides from any variable source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            work_dir: lookup("CLAUSEWATCH_WORK_DIR"),
            log_level: lookup("CLAUSEWATCH_LOG_LEVEL"),
            llm_provider: lookup("CLAUSEWATCH_LLM_PROVIDER").or_else(|| lookup("LLM_PROVIDER")),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively: the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Internal loader: accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let mut visited = HashSet::new();
    let merged = load_raw_merged(path, &mut visited)?;
    let parsed = RawConfig::deserialize(merged)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;
    resolve(parsed, overrides)
}

fn resolve(raw: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let g = raw.general;

    let work_dir_str = overrides.work_dir.as_deref().unwrap_or(&g.work_dir);
    let work_dir = expand_home(work_dir_str);
    let log_level = overrides.log_level.clone().unwrap_or(g.log_level);
    logger::validate_filter(&log_level)
        .map_err(|e| AppError::Config(format!("general.log_level: {e}")))?;
    let under_work_dir = |p: &str| resolve_dir(&work_dir, p);

    let store = StoreConfig {
        backend: raw.store.backend,
        dir: under_work_dir(&raw.store.dir),
        chunk_size: raw.store.chunk_size,
        chunk_overlap: raw.store.chunk_overlap,
    };
    validate_store(&store)?;

    // Duplicates would cost extra LLM calls that collapse into one entry.
    let mut seen = HashSet::new();
    let key_clauses: Vec<String> = raw
        .analysis
        .key_clauses
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();
    if key_clauses.is_empty() {
        return Err(AppError::Config("analysis.key_clauses must name at least one clause".into()));
    }

    let provider = overrides
        .llm_provider
        .clone()
        .unwrap_or(raw.llm.provider)
        .to_lowercase();
    let llm_api_key = api_key_from_env(&provider);

    Ok(Config {
        log_file: g.log_file.as_deref().map(|p| under_work_dir(p)),
        watcher: WatcherConfig {
            uploads_dir: under_work_dir(&raw.watcher.uploads_dir),
            settle_ms: raw.watcher.settle_ms,
            scan_existing: raw.watcher.scan_existing,
        },
        analysis: AnalysisConfig {
            output_dir: under_work_dir(&raw.analysis.output_dir),
            // Prompt overrides ship with the repo, so they stay relative to the CWD.
            prompts_dir: expand_home(&raw.analysis.prompts_dir),
            key_clauses,
            max_contract_chars: raw.analysis.max_contract_chars,
        },
        store,
        llm: LlmConfig {
            provider,
            ollama: OllamaConfig {
                api_base_url: raw.llm.ollama.api_base_url,
                model: raw.llm.ollama.model,
                temperature: raw.llm.ollama.temperature,
                timeout_seconds: raw.llm.ollama.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: raw.llm.openai.api_base_url,
                model: raw.llm.openai.model,
                temperature: raw.llm.openai.temperature,
                timeout_seconds: raw.llm.openai.timeout_seconds,
            },
            anthropic: AnthropicConfig {
                api_base_url: raw.llm.anthropic.api_base_url,
                model: raw.llm.anthropic.model,
                temperature: raw.llm.anthropic.temperature,
                timeout_seconds: raw.llm.anthropic.timeout_seconds,
                max_tokens: raw.llm.anthropic.max_tokens,
            },
        },
        llm_api_key,
        work_dir,
        log_level,
    })
}

fn validate_store(store: &StoreConfig) -> Result<(), AppError> {
    if store.backend != "sqlite" {
        return Err(AppError::Config(format!(
            "store.backend must be 'sqlite', got '{}'",
            store.backend
        )));
    }
    if store.chunk_size == 0 {
        return Err(AppError::Config("store.chunk_size must be > 0".into()));
    }
    if store.chunk_overlap >= store.chunk_size {
        return Err(AppError::Config(format!(
            "store.chunk_overlap ({}) must be smaller than store.chunk_size ({})",
            store.chunk_overlap, store.chunk_size
        )));
    }
    Ok(())
}

/// `LLM_API_KEY` first, then the provider's conventional variable.
fn api_key_from_env(provider: &str) -> Option<String> {
    let specific = match provider {
        "openai" | "openai-compatible" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        _ => None,
    };
    env::var("LLM_API_KEY")
        .ok()
        .or_else(|| specific.and_then(|name| env::var(name).ok()))
        .filter(|k| !k.trim().is_empty())
}

/// Absolute (or `~`) paths are kept; relative paths are joined onto `work_dir`.
fn resolve_dir(work_dir: &Path, path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        work_dir.join(expanded)
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
