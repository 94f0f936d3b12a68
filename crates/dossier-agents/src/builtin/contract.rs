//! Contract agents: clause extraction, legal escalation and negotiation drafting.

use std::sync::LazyLock;

use async_trait::async_trait;
use dossier_core::summary::clip;
use regex::Regex;
use serde::Deserialize;

use crate::errors::AgentError;
use crate::outputs::{
    Clause, ClauseSet, EscalationMemo, Finding, NegotiationPoint, NegotiationPoints, RiskLevel,
    Severity,
};
use crate::traits::{AgentContext, AgentHandler, AgentOutput};

const CLAUSE_TEXT_BYTES: usize = 200;

static NUMBERED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(?:clause|section|article)\s+\d+[.:)]?|\d+(?:\.\d+)*[.)])\s*").unwrap()
});

const HIGH_RISK_TERMS: &[&str] = &[
    "unlimited liability",
    "uncapped",
    "terminate at any time",
    "without notice",
    "automatic renewal",
    "automatically renew",
    "auto-renew",
    "non-compete",
    "exclusive",
    "sole discretion",
];

const MEDIUM_RISK_TERMS: &[&str] = &[
    "liability",
    "indemnif",
    "termination",
    "terminate",
    "penalty",
    "late fee",
    "governing law",
    "warranty",
    "confidential",
    "assignment",
];

#[derive(Deserialize)]
struct ContentInput {
    content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// clause-extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Split `content` into clauses.
///
/// A clause starts at a numbered heading (`1.`, `2.3)`, `Clause 4:`) or after a
/// blank line, and runs until the next one.
pub fn split_clauses(content: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    for line in content.lines() {
        let trimmed = line.trim();
        let starts_new = trimmed.is_empty() || NUMBERED_HEADING.is_match(trimmed);
        if starts_new && !current.trim().is_empty() {
            clauses.push(current.trim().to_owned());
            current.clear();
        }
        if !trimmed.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(trimmed);
        }
    }
    if !current.trim().is_empty() {
        clauses.push(current.trim().to_owned());
    }
    clauses
}

fn clause_title(text: &str) -> String {
    let body = NUMBERED_HEADING.replace(text, "");
    let head = body
        .split_once([':', '.'])
        .map_or(body.as_ref(), |(head, _)| head)
        .trim();
    if !head.is_empty() && head.chars().count() <= 60 {
        return head.to_owned();
    }
    body.split_whitespace().take(6).collect::<Vec<_>>().join(" ")
}

/// Assess one clause's risk from its wording.
pub fn assess_clause(text: &str) -> (RiskLevel, String) {
    let lower = text.to_lowercase();
    if let Some(term) = HIGH_RISK_TERMS.iter().find(|t| lower.contains(*t)) {
        return (RiskLevel::High, format!("contains '{term}'"));
    }
    if let Some(term) = MEDIUM_RISK_TERMS.iter().find(|t| lower.contains(*t)) {
        return (RiskLevel::Medium, format!("mentions '{term}'"));
    }
    (RiskLevel::Low, "standard terms".to_owned())
}

/// Extract and classify clauses.
pub fn extract_clauses(content: &str) -> ClauseSet {
    let clauses = split_clauses(content)
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let (risk, rationale) = assess_clause(text);
            Clause {
                id: format!("clause-{}", i + 1),
                title: clause_title(text),
                risk,
                rationale,
                text: clip(text, CLAUSE_TEXT_BYTES),
            }
        })
        .collect();
    ClauseSet { clauses }
}

/// `clause-extractor` agent.
pub struct ClauseExtractor;

impl ClauseExtractor {
    /// Registry id.
    pub const ID: &'static str = "clause-extractor";
}

#[async_trait]
impl AgentHandler for ClauseExtractor {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: ContentInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &extract_clauses(&input.content))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// legal-escalation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LegalInput {
    reason: String,
    #[serde(default)]
    risk_score: Option<u32>,
    #[serde(default)]
    clauses: Vec<Clause>,
    #[serde(default)]
    findings: Vec<Finding>,
}

fn build_legal_memo(input: &LegalInput) -> EscalationMemo {
    let critical = input.findings.iter().any(|f| f.severity == Severity::Critical)
        || input.risk_score.is_some_and(|s| s >= 80);

    let mut issues: Vec<String> = input
        .clauses
        .iter()
        .filter(|c| c.risk == RiskLevel::High)
        .map(|c| format!("{} {}: {}", c.id, c.title, c.rationale))
        .collect();
    issues.extend(
        input
            .findings
            .iter()
            .filter(|f| f.severity >= Severity::High)
            .map(|f| format!("{} ({})", f.message, f.severity)),
    );

    let summary = match input.risk_score {
        Some(score) => format!("Legal review required (risk score {score}): {}", input.reason),
        None => format!("Legal review required: {}", input.reason),
    };

    EscalationMemo {
        audience: "legal".into(),
        priority: if critical { Severity::Critical } else { Severity::High },
        summary,
        issues,
    }
}

/// `legal-escalation` agent.
pub struct LegalEscalation;

impl LegalEscalation {
    /// Registry id.
    pub const ID: &'static str = "legal-escalation";
}

#[async_trait]
impl AgentHandler for LegalEscalation {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: LegalInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &build_legal_memo(&input))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// negotiation-drafter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NegotiationInput {
    clauses: Vec<Clause>,
}

fn position_for(clause: &Clause) -> (String, String) {
    let text = format!("{} {}", clause.title, clause.text).to_lowercase();
    if text.contains("liabilit") || text.contains("uncapped") {
        (
            "Cap liability at fees paid in the preceding 12 months".into(),
            "Cap liability at twice the annual fees".into(),
        )
    } else if text.contains("renew") {
        (
            "Replace automatic renewal with opt-in renewal".into(),
            "Add a 60-day opt-out window before each renewal".into(),
        )
    } else if text.contains("terminat") || text.contains("notice") {
        (
            "Require 30 days' written notice before termination".into(),
            "Require 14 days' notice with a cure period".into(),
        )
    } else if text.contains("exclusiv") || text.contains("non-compete") {
        (
            "Remove the exclusivity obligation".into(),
            "Limit exclusivity to 12 months and a named territory".into(),
        )
    } else if text.contains("indemnif") {
        (
            "Make indemnities mutual".into(),
            "Limit indemnity to third-party claims caused by negligence".into(),
        )
    } else {
        (
            format!("Revise '{}' to market-standard terms", clause.title),
            "Add reciprocal obligations".into(),
        )
    }
}

fn draft_negotiation(input: &NegotiationInput) -> NegotiationPoints {
    let mut risky: Vec<&Clause> = input
        .clauses
        .iter()
        .filter(|c| c.risk >= RiskLevel::Medium)
        .collect();
    // high-risk clauses first, document order within a level
    risky.sort_by_key(|c| std::cmp::Reverse(c.risk));
    let points = risky
        .into_iter()
        .map(|c| {
            let (ask, fallback) = position_for(c);
            NegotiationPoint {
                clause_id: c.id.clone(),
                ask,
                fallback,
            }
        })
        .collect();
    NegotiationPoints { points }
}

/// `negotiation-drafter` agent.
pub struct NegotiationDrafter;

impl NegotiationDrafter {
    /// Registry id.
    pub const ID: &'static str = "negotiation-drafter";
}

#[async_trait]
impl AgentHandler for NegotiationDrafter {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: NegotiationInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &draft_negotiation(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dossier_core::{ExecutionMode, TraceId};
    use serde_json::json;

    const CONTRACT: &str = "1. Services: Provider delivers monthly reports.\n\
        2. Liability: Provider liability is capped at fees paid.\n\
        3. Term: This agreement will automatically renew each year.\n\
        \n\
        Payment is due within 30 days.";

    // ── clause-extractor ─────────────────────────────────────────────────

    #[test]
    fn splits_on_numbering_and_blank_lines() {
        let clauses = split_clauses(CONTRACT);
        assert_eq!(clauses.len(), 4);
        assert!(clauses[3].starts_with("Payment"));
    }

    #[test]
    fn continuation_lines_join_their_clause() {
        let clauses = split_clauses("1. Fees: monthly\ninvoiced in arrears\n2. Term: one year");
        assert_eq!(clauses, vec!["1. Fees: monthly invoiced in arrears", "2. Term: one year"]);
    }

    #[test]
    fn classifies_clause_risk() {
        let set = extract_clauses(CONTRACT);
        let risks: Vec<RiskLevel> = set.clauses.iter().map(|c| c.risk).collect();
        assert_eq!(
            risks,
            vec![RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Low]
        );
        assert_eq!(set.clauses[1].id, "clause-2");
        assert_eq!(set.clauses[1].title, "Liability");
    }

    #[test]
    fn untitled_clause_uses_leading_words() {
        assert_eq!(clause_title("Payment is due within 30 days"), "Payment is due within 30 days");
        let long = "The customer shall at all times maintain adequate insurance coverage with reputable carriers acceptable to provider";
        assert_eq!(clause_title(long), "The customer shall at all times");
    }

    #[test]
    fn empty_content_has_no_clauses() {
        assert!(extract_clauses("  \n\n ").clauses.is_empty());
    }

    // ── legal-escalation ─────────────────────────────────────────────────

    #[tokio::test]
    async fn legal_memo_is_critical_for_high_score() {
        let clauses = extract_clauses(CONTRACT).clauses;
        let ctx = AgentContext {
            trace_id: TraceId::new(),
            mode: ExecutionMode::Fake,
            timestamp: Utc::now(),
            input: json!({"reason": "score over threshold", "risk_score": 85, "clauses": clauses}),
        };
        let out = LegalEscalation.handle(&ctx).await.unwrap();
        let memo: EscalationMemo = serde_json::from_value(out.output).unwrap();
        assert_eq!(memo.priority, Severity::Critical);
        assert_eq!(memo.audience, "legal");
        assert!(memo.summary.contains("risk score 85"));
        assert_eq!(memo.issues.len(), 1);
        assert!(memo.issues[0].starts_with("clause-3"));
    }

    // ── negotiation-drafter ──────────────────────────────────────────────

    #[test]
    fn negotiation_targets_risky_clauses_high_first() {
        let input = NegotiationInput {
            clauses: extract_clauses(CONTRACT).clauses,
        };
        let points = draft_negotiation(&input).points;
        let ids: Vec<&str> = points.iter().map(|p| p.clause_id.as_str()).collect();
        assert_eq!(ids, vec!["clause-3", "clause-2"]);
        assert!(points[0].ask.contains("opt-in renewal"));
        assert!(points[1].ask.contains("Cap liability"));
    }
}
