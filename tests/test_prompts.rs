//! Tests for analysis prompt templates in config/prompts

use std::fs;

use clausewatch::agent::PromptSet;

#[test]
fn test_stage_prompt_files_exist() {
    for name in ["classify.txt", "clause.txt", "risk.txt", "summary.txt"] {
        let path = format!("config/prompts/{name}");
        assert!(fs::metadata(&path).is_ok(), "{name} prompt file missing");
    }
}

#[test]
fn test_classify_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/classify.txt").unwrap();
    assert!(text.contains("{{contract_text}}"), "classify.txt should contain {{contract_text}} variable");
    assert!(text.contains("NDA/SLA/MSA/Other"));
}

#[test]
fn test_clause_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/clause.txt").unwrap();
    assert!(text.contains("{{clause_name}}"), "clause.txt should contain {{clause_name}} variable");
    assert!(text.contains("{{contract_text}}"), "clause.txt should contain {{contract_text}} variable");
}

#[test]
fn test_risk_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/risk.txt").unwrap();
    assert!(text.contains("{{clause_name}}"), "risk.txt should contain {{clause_name}} variable");
    assert!(text.contains("{{clause_text}}"), "risk.txt should contain {{clause_text}} variable");
    assert!(!text.contains("{{contract_text}}"), "risk.txt is scored on the clause only");
}

#[test]
fn test_summary_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/summary.txt").unwrap();
    assert!(text.contains("{{contract_text}}"), "summary.txt should contain {{contract_text}} variable");
}

#[test]
fn test_shipped_prompts_match_builtin_wording() {
    let shipped = PromptSet::load("config/prompts");
    let builtin = PromptSet::default();
    assert_eq!(shipped.classify("X"), builtin.classify("X"));
    assert_eq!(shipped.clause("Termination", "X"), builtin.clause("Termination", "X"));
    assert_eq!(shipped.risk("Indemnity", "Y"), builtin.risk("Indemnity", "Y"));
    assert_eq!(shipped.summary("X"), builtin.summary("X"));
}
