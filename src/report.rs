//! Read side of stored analyses: risk roll-ups, clause filtering and the
//! plain-text views printed by `clausewatch list` / `clausewatch show`.

use std::fmt::Write as _;

use crate::agent::{ContractAnalysis, RiskLevel};
use crate::error::AppError;
use crate::store::analysis::AnalysisStore;

pub use crate::agent::overall_risk;

/// Marker shown next to a risk level.
pub fn risk_badge(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "🟢",
        RiskLevel::Medium => "🟡",
        RiskLevel::High => "🔴",
        RiskLevel::Unknown => "⚪",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl RiskCounts {
    /// Count levels over the extracted clauses. A clause without a score counts as unknown.
    pub fn from_analysis(analysis: &ContractAnalysis) -> Self {
        let mut counts = RiskCounts::default();
        for name in analysis.clauses.keys() {
            counts.total += 1;
            match clause_risk(analysis, name) {
                RiskLevel::High => counts.high += 1,
                RiskLevel::Medium => counts.medium += 1,
                RiskLevel::Low => counts.low += 1,
                RiskLevel::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

/// One clause as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseView {
    pub name: String,
    pub text: String,
    pub risk: RiskLevel,
    pub rationale: String,
}

fn clause_risk(analysis: &ContractAnalysis, name: &str) -> RiskLevel {
    analysis.risks.get(name).copied().unwrap_or_default()
}

/// Clauses matching `search` (case-insensitive, name or text) and, when
/// `levels` is non-empty, one of `levels`.
pub fn filter_clauses(
    analysis: &ContractAnalysis,
    search: Option<&str>,
    levels: &[RiskLevel],
) -> Vec<ClauseView> {
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    analysis
        .clauses
        .iter()
        .filter_map(|(name, text)| {
            let risk = clause_risk(analysis, name);
            if let Some(n) = &needle {
                if !name.to_lowercase().contains(n.as_str()) && !text.to_lowercase().contains(n.as_str()) {
                    return None;
                }
            }
            if !levels.is_empty() && !levels.contains(&risk) {
                return None;
            }
            Some(ClauseView {
                name: name.clone(),
                text: text.clone(),
                risk,
                rationale: analysis.risk_rationales.get(name).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// One line of `clausewatch list`.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub file: String,
    /// `Err` holds the reason an entry could not be read.
    pub analysis: Result<ContractAnalysis, String>,
}

/// Load every stored analysis in listing order.
pub fn load_listing(store: &AnalysisStore) -> Result<Vec<ListingEntry>, AppError> {
    Ok(store
        .list()?
        .into_iter()
        .map(|file| {
            let analysis = store.load(&file).map_err(|e| e.to_string());
            ListingEntry { file, analysis }
        })
        .collect())
}

pub fn render_listing(entries: &[ListingEntry]) -> String {
    if entries.is_empty() {
        return "No analyzed contracts found.\n".to_string();
    }
    let width = entries
        .iter()
        .map(|e| e.file.chars().count())
        .max()
        .unwrap_or(0)
        .max("FILE".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<5}  {:<9}  {:>4} {:>4} {:>4} {:>4}", "FILE", "TYPE", "RISK", "HIGH", "MED", "LOW", "UNK");
    for entry in entries {
        match &entry.analysis {
            Ok(a) => {
                let c = RiskCounts::from_analysis(a);
                let risk = overall_risk(a.risks.values().copied());
                let _ = writeln!(
                    out,
                    "{:<width$}  {:<5}  {} {:<7}  {:>4} {:>4} {:>4} {:>4}",
                    entry.file,
                    a.contract_type.as_str(),
                    risk_badge(risk),
                    risk.as_str(),
                    c.high,
                    c.medium,
                    c.low,
                    c.unknown,
                );
            }
            Err(reason) => {
                let _ = writeln!(out, "{:<width$}  unreadable: {reason}", entry.file);
            }
        }
    }
    out
}

/// Overview card followed by one card per clause in `clauses`.
pub fn render_analysis(analysis: &ContractAnalysis, clauses: &[ClauseView]) -> String {
    let counts = RiskCounts::from_analysis(analysis);
    let overall = overall_risk(analysis.risks.values().copied());

    let mut out = String::new();
    let _ = writeln!(out, "📄 {}", analysis.doc_id);
    let _ = writeln!(out, "Type:          {}", analysis.contract_type);
    let _ = writeln!(out, "Overall risk:  {} {}", risk_badge(overall), overall);
    let _ = writeln!(
        out,
        "Clauses:       {} total, {} high, {} medium, {} low",
        counts.total, counts.high, counts.medium, counts.low
    );
    if !analysis.analyzed_at.is_empty() {
        let _ = writeln!(
            out,
            "Analysed:      {} via {}/{}",
            analysis.analyzed_at, analysis.provider, analysis.model
        );
    }
    if analysis.truncated {
        let _ = writeln!(out, "Note:          contract text was truncated for analysis");
    }
    let _ = writeln!(out, "\nSummary:\n{}\n", analysis.summary);

    if clauses.is_empty() {
        let _ = writeln!(out, "No clauses match your filters.");
        return out;
    }
    for clause in clauses {
        let _ = writeln!(out, "── {} {} ({})", risk_badge(clause.risk), clause.name, clause.risk);
        let _ = writeln!(out, "{}", clause.text);
        if !clause.rationale.is_empty() {
            let _ = writeln!(out, "Risk: {}", clause.rationale);
        }
        out.push('\n');
    }
    out
}
