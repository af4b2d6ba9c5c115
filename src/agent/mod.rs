//! Contract analysis agent.
//!
//! One analysis is a fixed, strictly sequential chain of LLM calls:
//!
//! ```text
//! classify ─▶ clause × N ─▶ risk × N ─▶ summary
//! ```
//!
//! The first failing call aborts the analysis; [`AgentError`] names the
//! stage and, for clause and risk calls, the clause.

pub mod prompts;
pub mod risk;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{AnalysisConfig, LlmConfig};
use crate::llm::{LlmProvider, ProviderError};
use crate::store::{now_iso8601, sha256_hex};

pub use prompts::PromptSet;
pub use risk::{ContractType, RiskLevel, extract_risk_level, overall_risk};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("classification failed: {0}")]
    Classify(#[source] ProviderError),
    #[error("extracting clause '{clause}' failed: {source}")]
    Clause {
        clause: String,
        #[source]
        source: ProviderError,
    },
    #[error("scoring risk of clause '{clause}' failed: {source}")]
    Risk {
        clause: String,
        #[source]
        source: ProviderError,
    },
    #[error("summary failed: {0}")]
    Summary(#[source] ProviderError),
}

impl AgentError {
    pub fn stage(&self) -> &'static str {
        match self {
            AgentError::Classify(_) => "classify",
            AgentError::Clause { .. } => "clause",
            AgentError::Risk { .. } => "risk",
            AgentError::Summary(_) => "summary",
        }
    }

    pub fn clause(&self) -> Option<&str> {
        match self {
            AgentError::Clause { clause, .. } | AgentError::Risk { clause, .. } => Some(clause),
            _ => None,
        }
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

/// Summed token accounting over every call of one analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisUsage {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The persisted analysis record. Serialised as `<doc_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAnalysis {
    pub doc_id: String,
    #[serde(default)]
    pub content_hash: String,
    pub contract_type: ContractType,
    /// Classification reply as returned by the model.
    #[serde(default)]
    pub contract_type_raw: String,
    pub clauses: BTreeMap<String, String>,
    pub risks: BTreeMap<String, RiskLevel>,
    pub risk_rationales: BTreeMap<String, String>,
    #[serde(default)]
    pub overall_risk: RiskLevel,
    pub summary: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub analyzed_at: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub usage: AnalysisUsage,
}

// ── Agent ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ContractAgent {
    provider: LlmProvider,
    prompts: PromptSet,
    key_clauses: Vec<String>,
    max_contract_chars: usize,
    provider_name: String,
    model: String,
}

impl ContractAgent {
    pub fn new(provider: LlmProvider, analysis: &AnalysisConfig, llm: &LlmConfig) -> Self {
        Self {
            provider,
            prompts: PromptSet::load(&analysis.prompts_dir),
            key_clauses: analysis.key_clauses.clone(),
            max_contract_chars: analysis.max_contract_chars,
            provider_name: llm.provider.clone(),
            model: llm.active_model().to_string(),
        }
    }

    /// Classify, extract key clauses, score each, summarise.
    pub async fn analyze(&self, text: &str, doc_id: &str) -> Result<ContractAnalysis, AgentError> {
        let (contract, truncated) = truncate_chars(text, self.max_contract_chars);
        if truncated {
            info!(doc_id = %doc_id, limit = self.max_contract_chars, "contract text truncated for prompts");
        }
        let mut usage = AnalysisUsage::default();

        let contract_type_raw = self
            .ask(&self.prompts.classify(contract), &mut usage)
            .await
            .map_err(AgentError::Classify)?;
        let contract_type = ContractType::from_reply(&contract_type_raw);
        info!(doc_id = %doc_id, stage = "classify", contract_type = %contract_type, "classified");

        let mut clauses = BTreeMap::new();
        for name in &self.key_clauses {
            let clause_text = self
                .ask(&self.prompts.clause(name, contract), &mut usage)
                .await
                .map_err(|source| AgentError::Clause { clause: name.clone(), source })?;
            debug!(doc_id = %doc_id, stage = "clause", clause = %name, chars = clause_text.len(), "clause extracted");
            clauses.insert(name.clone(), clause_text);
        }

        let mut risks = BTreeMap::new();
        let mut risk_rationales = BTreeMap::new();
        for name in &self.key_clauses {
            let clause_text = clauses.get(name).map(String::as_str).unwrap_or_default();
            let reply = self
                .ask(&self.prompts.risk(name, clause_text), &mut usage)
                .await
                .map_err(|source| AgentError::Risk { clause: name.clone(), source })?;
            let level = extract_risk_level(&reply);
            info!(doc_id = %doc_id, stage = "risk", clause = %name, risk = %level, "clause scored");
            risks.insert(name.clone(), level);
            risk_rationales.insert(name.clone(), reply);
        }

        let summary = self
            .ask(&self.prompts.summary(contract), &mut usage)
            .await
            .map_err(AgentError::Summary)?;

        let overall = overall_risk(risks.values().copied());
        info!(
            doc_id = %doc_id,
            overall_risk = %overall,
            calls = usage.calls,
            "analysis complete"
        );

        Ok(ContractAnalysis {
            doc_id: doc_id.to_string(),
            content_hash: sha256_hex(text),
            contract_type,
            contract_type_raw,
            clauses,
            risks,
            risk_rationales,
            overall_risk: overall,
            summary,
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            analyzed_at: now_iso8601(),
            truncated,
            usage,
        })
    }

    async fn ask(&self, prompt: &str, usage: &mut AnalysisUsage) -> Result<String, ProviderError> {
        let reply = self.provider.complete(prompt).await?;
        usage.calls += 1;
        if let Some(u) = reply.usage {
            usage.input_tokens += u.input_tokens;
            usage.output_tokens += u.output_tokens;
        }
        Ok(reply.text.trim().to_string())
    }
}

/// Cut `text` to at most `max` chars on a char boundary. `max == 0` keeps everything.
fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    if max == 0 {
        return (text, false);
    }
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::providers::scripted::ScriptedProvider;

    const NDA: &str = "MUTUAL NON-DISCLOSURE AGREEMENT between Acme and Globex.";

    fn agent_with(script: ScriptedProvider, clauses: &[&str]) -> ContractAgent {
        let cfg = Config::test_default(std::path::Path::new("/nonexistent"));
        let mut analysis = cfg.analysis.clone();
        analysis.key_clauses = clauses.iter().map(|s| s.to_string()).collect();
        ContractAgent::new(LlmProvider::Scripted(script), &analysis, &cfg.llm)
    }

    fn happy_script() -> ScriptedProvider {
        ScriptedProvider::new(vec![
            ("Classify this contract", Ok("NDA")),
            ("Extract the *Termination*", Ok("Either party may terminate on 30 days notice.")),
            ("Extract the *Indemnity*", Ok("Acme indemnifies Globex.")),
            ("Rate the *Termination*", Ok("Low - mutual and balanced.")),
            ("Rate the *Indemnity*", Ok("High: one-sided and uncapped.")),
            ("Summarize this contract", Ok("  A mutual NDA between Acme and Globex.  ")),
        ])
    }

    #[tokio::test]
    async fn full_analysis() {
        let script = happy_script();
        let agent = agent_with(script.clone(), &["Termination", "Indemnity"]);
        let a = agent.analyze(NDA, "nda.txt").await.unwrap();

        assert_eq!(a.doc_id, "nda.txt");
        assert_eq!(a.contract_type, ContractType::Nda);
        assert_eq!(a.contract_type_raw, "NDA");
        assert_eq!(a.clauses["Termination"], "Either party may terminate on 30 days notice.");
        assert_eq!(a.risks["Termination"], RiskLevel::Low);
        assert_eq!(a.risks["Indemnity"], RiskLevel::High);
        assert_eq!(a.risk_rationales["Indemnity"], "High: one-sided and uncapped.");
        assert_eq!(a.overall_risk, RiskLevel::High);
        assert_eq!(a.summary, "A mutual NDA between Acme and Globex.");
        assert_eq!(a.provider, "dummy");
        assert_eq!(a.content_hash, sha256_hex(NDA));
        assert!(!a.truncated);
        assert_eq!(a.usage, AnalysisUsage { calls: 6, input_tokens: 60, output_tokens: 12 });
        assert_eq!(script.calls().len(), 6);
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let script = happy_script();
        let agent = agent_with(script.clone(), &["Termination", "Indemnity"]);
        agent.analyze(NDA, "nda.txt").await.unwrap();

        let calls = script.calls();
        assert!(calls[0].starts_with("Classify"));
        assert!(calls[1].contains("*Termination*") && calls[1].starts_with("Extract"));
        assert!(calls[2].contains("*Indemnity*") && calls[2].starts_with("Extract"));
        assert!(calls[3].starts_with("Rate the *Termination*"));
        // Risk prompt carries the extracted clause, not the whole contract.
        assert!(calls[3].contains("Either party may terminate"));
        assert!(!calls[3].contains("Globex."));
        assert!(calls[5].starts_with("Summarize"));
    }

    #[tokio::test]
    async fn unrated_reply_is_unknown() {
        let script = ScriptedProvider::new(vec![
            ("Classify", Ok("It is a lease")),
            ("Extract", Ok("none found")),
            ("Rate", Ok("cannot tell")),
            ("Summarize", Ok("A lease.")),
        ]);
        let a = agent_with(script, &["Termination"]).analyze("lease", "l.txt").await.unwrap();
        assert_eq!(a.contract_type, ContractType::Other);
        assert_eq!(a.risks["Termination"], RiskLevel::Unknown);
        assert_eq!(a.overall_risk, RiskLevel::Unknown);
    }

    #[tokio::test]
    async fn failure_names_stage_and_clause() {
        let script = ScriptedProvider::new(vec![
            ("Classify", Ok("MSA")),
            ("Extract the *Termination*", Ok("30 days")),
            ("Extract the *Indemnity*", Err("connection reset")),
            ("Summarize", Ok("unused")),
        ]);
        let err = agent_with(script.clone(), &["Termination", "Indemnity", "Confidentiality"])
            .analyze("msa", "m.txt")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "clause");
        assert_eq!(err.clause(), Some("Indemnity"));
        assert!(err.to_string().contains("connection reset"));
        // Nothing after the failing call.
        assert_eq!(script.calls().len(), 3);
    }

    #[tokio::test]
    async fn classify_failure() {
        let script = ScriptedProvider::new(vec![("Classify", Err("timeout"))]);
        let err = agent_with(script, &["Termination"]).analyze("x", "x.txt").await.unwrap_err();
        assert_eq!(err.stage(), "classify");
        assert_eq!(err.clause(), None);
    }

    #[tokio::test]
    async fn long_contract_is_truncated_for_prompts() {
        let script = ScriptedProvider::new(vec![
            ("Classify", Ok("SLA")),
            ("Summarize", Ok("short")),
        ]);
        let cfg = Config::test_default(std::path::Path::new("/nonexistent"));
        let mut analysis = cfg.analysis.clone();
        analysis.key_clauses = Vec::new();
        analysis.max_contract_chars = 5;
        let agent = ContractAgent::new(LlmProvider::Scripted(script.clone()), &analysis, &cfg.llm);

        let a = agent.analyze("αβγδεζηθ", "s.txt").await.unwrap();
        assert!(a.truncated);
        assert!(script.calls()[0].contains("αβγδε\n"));
        assert!(!script.calls()[0].contains("ζ"));
        assert_eq!(a.content_hash, sha256_hex("αβγδεζηθ"));
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("abc", 0), ("abc", false));
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
        assert_eq!(truncate_chars("abcd", 3), ("abc", true));
    }

    #[test]
    fn analysis_json_layout() {
        let a = ContractAnalysis {
            doc_id: "nda.pdf".into(),
            content_hash: "h".into(),
            contract_type: ContractType::Nda,
            contract_type_raw: "NDA".into(),
            clauses: BTreeMap::from([("Termination".to_string(), "t".to_string())]),
            risks: BTreeMap::from([("Termination".to_string(), RiskLevel::Medium)]),
            risk_rationales: BTreeMap::from([("Termination".to_string(), "Medium".to_string())]),
            overall_risk: RiskLevel::Medium,
            summary: "s".into(),
            provider: "ollama".into(),
            model: "llama3".into(),
            analyzed_at: "2026-10-16T10:00:00Z".into(),
            truncated: false,
            usage: AnalysisUsage { calls: 8, input_tokens: 0, output_tokens: 0 },
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["contract_type"], "NDA");
        assert_eq!(v["risks"]["Termination"], "Medium");
        assert_eq!(v["overall_risk"], "Medium");
        assert_eq!(v["usage"]["calls"], 8);
    }

    #[test]
    fn minimal_legacy_record_deserializes() {
        let json = r#"{
            "doc_id": "old.pdf",
            "contract_type": "Type: NDA. This is a mutual non-disclosure agreement.",
            "clauses": {"Termination": "x"},
            "risks": {"Termination": "High"},
            "risk_rationales": {"Termination": "High"},
            "summary": "s"
        }"#;
        let a: ContractAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(a.contract_type, ContractType::Nda);
        assert_eq!(a.risks["Termination"], RiskLevel::High);
        assert_eq!(a.overall_risk, RiskLevel::Unknown);
        assert_eq!(a.usage.calls, 0);
    }
}
