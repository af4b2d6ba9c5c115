//! Label extraction from free-form LLM replies.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RISK_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(low|medium|high)\b").expect("valid risk regex"));

static TYPE_ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(nda|sla|msa)\b").expect("valid type regex"));

static TYPE_NDA_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnon-?\s?disclosure\b").expect("valid nda regex"));

static TYPE_SLA_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bservice[\s-]+level\b").expect("valid sla regex"));

static TYPE_MSA_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmaster\s+services?\b").expect("valid msa regex"));

/// Risk rating of one clause. Ordered so that `max()` yields the worst level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum RiskLevel {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Unknown => "Unknown",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "unknown" => Ok(RiskLevel::Unknown),
            other => Err(format!("unknown risk level '{other}' (expected low, medium, high or unknown)")),
        }
    }
}

/// First standalone `low`/`medium`/`high` in `reply`, any case.
///
/// `"Medium - the notice period is short"` → `Medium`;
/// `"lowest exposure"` → `Unknown` (not a whole word).
pub fn extract_risk_level(reply: &str) -> RiskLevel {
    RISK_WORD
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(RiskLevel::Unknown)
}

/// Worst rated level present, or `Unknown` if nothing was rated.
pub fn overall_risk<I>(levels: I) -> RiskLevel
where
    I: IntoIterator<Item = RiskLevel>,
{
    levels.into_iter().max().unwrap_or_default()
}

/// Normalised contract category.
///
/// Serialises as its label. Deserialising accepts any string and runs it
/// through [`ContractType::from_reply`], so records that stored the raw
/// classification reply still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ContractType {
    #[serde(rename = "NDA")]
    Nda,
    #[serde(rename = "SLA")]
    Sla,
    #[serde(rename = "MSA")]
    Msa,
    #[default]
    Other,
}

impl ContractType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractType::Nda => "NDA",
            ContractType::Sla => "SLA",
            ContractType::Msa => "MSA",
            ContractType::Other => "Other",
        }
    }

    /// Map a classification reply to a category.
    ///
    /// The first acronym wins; spelled-out names are the fallback.
    pub fn from_reply(reply: &str) -> Self {
        if let Some(m) = TYPE_ACRONYM.find(reply) {
            return match m.as_str().to_ascii_uppercase().as_str() {
                "NDA" => ContractType::Nda,
                "SLA" => ContractType::Sla,
                _ => ContractType::Msa,
            };
        }
        if TYPE_NDA_WORDS.is_match(reply) {
            ContractType::Nda
        } else if TYPE_SLA_WORDS.is_match(reply) {
            ContractType::Sla
        } else if TYPE_MSA_WORDS.is_match(reply) {
            ContractType::Msa
        } else {
            ContractType::Other
        }
    }
}

impl<'de> Deserialize<'de> for ContractType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ContractType::from_reply(&raw))
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
