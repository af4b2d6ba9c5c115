//! Prompt templates for the analysis stages.
//!
//! Each stage reads `<prompts_dir>/<stage>.txt`; a missing or blank file
//! falls back to the built-in wording below. Templates use `{{key}}`
//! placeholders, substituted in a single pass so that contract text which
//! happens to contain `{{...}}` is never expanded a second time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const CLASSIFY_FILE: &str = "classify.txt";
pub const CLAUSE_FILE: &str = "clause.txt";
pub const RISK_FILE: &str = "risk.txt";
pub const SUMMARY_FILE: &str = "summary.txt";

const DEFAULT_CLASSIFY: &str = "Classify this contract. Is it an NDA, SLA, MSA, or Other?
Contract:
{{contract_text}}
Type (NDA/SLA/MSA/Other):";

const DEFAULT_CLAUSE: &str = "Extract the *{{clause_name}}* clause from this contract.
Contract:
{{contract_text}}
Clause:";

const DEFAULT_RISK: &str = "Rate the *{{clause_name}}* clause as Low, Medium, or High risk with 1-sentence justification.
Clause:
{{clause_text}}
Risk (Low/Medium/High) and rationale:";

const DEFAULT_SUMMARY: &str = "Summarize this contract in 2-3 sentences.
Contract:
{{contract_text}}
Summary:";

/// Builds one prompt from a template file plus `{{key}}` variables.
pub struct PromptBuilder {
    template: String,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into(), vars: HashMap::new() }
    }

    /// Load `filename` from `prompts_dir`, or use `fallback` when the file
    /// is missing or blank.
    pub fn from_file(prompts_dir: &Path, filename: &str, fallback: &str) -> Self {
        let path = prompts_dir.join(filename);
        let template = match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                debug!("prompt: '{}' is blank, using built-in template", path.display());
                fallback.to_string()
            }
            Err(_) => {
                debug!("prompt: '{}' not found, using built-in template", path.display());
                fallback.to_string()
            }
        };
        Self::new(template)
    }

    /// Register a single variable.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Substitute registered variables. Unknown placeholders are left as-is.
    pub fn build(self) -> String {
        render(&self.template, &self.vars)
    }
}

fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// The four stage templates, loaded once per agent.
#[derive(Debug, Clone)]
pub struct PromptSet {
    classify: String,
    clause: String,
    risk: String,
    summary: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            classify: DEFAULT_CLASSIFY.to_string(),
            clause: DEFAULT_CLAUSE.to_string(),
            risk: DEFAULT_RISK.to_string(),
            summary: DEFAULT_SUMMARY.to_string(),
        }
    }
}

impl PromptSet {
    pub fn load(prompts_dir: impl Into<PathBuf>) -> Self {
        let dir = prompts_dir.into();
        Self {
            classify: PromptBuilder::from_file(&dir, CLASSIFY_FILE, DEFAULT_CLASSIFY).template,
            clause: PromptBuilder::from_file(&dir, CLAUSE_FILE, DEFAULT_CLAUSE).template,
            risk: PromptBuilder::from_file(&dir, RISK_FILE, DEFAULT_RISK).template,
            summary: PromptBuilder::from_file(&dir, SUMMARY_FILE, DEFAULT_SUMMARY).template,
        }
    }

    pub fn classify(&self, contract_text: &str) -> String {
        PromptBuilder::new(self.classify.as_str())
            .var("contract_text", contract_text)
            .build()
    }

    pub fn clause(&self, clause_name: &str, contract_text: &str) -> String {
        PromptBuilder::new(self.clause.as_str())
            .var("clause_name", clause_name)
            .var("contract_text", contract_text)
            .build()
    }

    pub fn risk(&self, clause_name: &str, clause_text: &str) -> String {
        PromptBuilder::new(self.risk.as_str())
            .var("clause_name", clause_name)
            .var("clause_text", clause_text)
            .build()
    }

    pub fn summary(&self, contract_text: &str) -> String {
        PromptBuilder::new(self.summary.as_str())
            .var("contract_text", contract_text)
            .build()
    }
}
