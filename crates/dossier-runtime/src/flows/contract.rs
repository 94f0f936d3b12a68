//! `contract-risk-review-v1`: clause risk, scoring and disclaimer check.

use std::collections::BTreeMap;
use std::sync::Arc;

use dossier_agents::builtin::{
    AdversarialReviewer, AuditRecorder, ClauseExtractor, ClientCommunicator, LegalEscalation,
    NegotiationDrafter,
};
use dossier_agents::outputs::{Clause, RiskLevel};
use serde_json::{Value, json};

use super::{
    DecisionAnalyzer, FlowDefinition, PlanStep, audit_record_input, client_draft_input,
    content_input, flag_unreviewed, keys, review_findings, review_input, severity_tally,
};
use crate::artifacts::{Artifact, ArtifactKind, DisclaimerCheck, RiskScore};
use crate::context::{AnalyzerVerdict, OrchestrationContext};
use crate::errors::RuntimeError;
use crate::types::{Decision, NextAction};

/// Flow id.
pub const FLOW_ID: &str = "contract-risk-review-v1";

/// Skill that scores overall contract risk.
pub const SCORE_RISK_SKILL: &str = "score-risk";

/// Skill that checks for a disclaimer.
pub const CHECK_DISCLAIMER_SKILL: &str = "check-disclaimer";

/// Score at or above which the contract goes to legal.
pub const ESCALATION_SCORE: f64 = 80.0;

/// Score at or above which terms are negotiated.
pub const NEGOTIATION_SCORE: f64 = 50.0;

/// Score at or above which the risk is merely acceptable.
pub const ACCEPTABLE_SCORE: f64 = 25.0;

const DISCLAIMER_MARKERS: &[&str] = &["disclaimer", "not legal advice"];

/// Build the flow.
pub fn definition() -> Result<FlowDefinition, RuntimeError> {
    FlowDefinition::new(
        FLOW_ID,
        vec![
            PlanStep::agent(
                "extract_clauses",
                ClauseExtractor::ID,
                keys::CLAUSES,
                ArtifactKind::Clauses,
                content_input,
            )
            .critical(),
            PlanStep::skill(
                "score_risk",
                SCORE_RISK_SKILL,
                keys::RISK_SCORE,
                ArtifactKind::RiskScore,
                score_input,
            ),
            PlanStep::agent(
                "adversarial_review",
                AdversarialReviewer::ID,
                keys::REVIEW_FINDINGS,
                ArtifactKind::ReviewFindings,
                review_input,
            ),
            PlanStep::skill(
                "check_disclaimer",
                CHECK_DISCLAIMER_SKILL,
                keys::DISCLAIMER_CHECK,
                ArtifactKind::DisclaimerCheck,
                disclaimer_input,
            ),
        ],
        vec![
            PlanStep::agent(
                "legal_escalation",
                LegalEscalation::ID,
                keys::ESCALATION_MEMO,
                ArtifactKind::EscalationMemo,
                legal_input,
            )
            .when(|ctx| ctx.next_action() == Some(NextAction::EscalateLegal)),
            PlanStep::agent(
                "negotiation",
                NegotiationDrafter::ID,
                keys::NEGOTIATION_POINTS,
                ArtifactKind::NegotiationPoints,
                negotiation_input,
            )
            .when(|ctx| ctx.next_action() == Some(NextAction::NegotiateTerms)),
        ],
        vec![
            PlanStep::agent(
                "draft_client_message",
                ClientCommunicator::ID,
                keys::CLIENT_DRAFT,
                ArtifactKind::ClientDraft,
                client_draft_input,
            ),
            PlanStep::agent(
                "record_audit",
                AuditRecorder::ID,
                keys::AUDIT_RECORD,
                ArtifactKind::AuditRecord,
                audit_record_input,
            ),
        ],
        Arc::new(ContractAnalyzer),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

fn clauses(ctx: &OrchestrationContext) -> &[Clause] {
    match ctx.artifact(keys::CLAUSES) {
        Some(Artifact::Clauses(set)) => &set.clauses,
        _ => &[],
    }
}

fn risk_score(ctx: &OrchestrationContext) -> Option<&RiskScore> {
    match ctx.artifact(keys::RISK_SCORE) {
        Some(Artifact::RiskScore(s)) => Some(s),
        _ => None,
    }
}

fn disclaimer(ctx: &OrchestrationContext) -> Option<&DisclaimerCheck> {
    match ctx.artifact(keys::DISCLAIMER_CHECK) {
        Some(Artifact::DisclaimerCheck(d)) => Some(d),
        _ => None,
    }
}

fn count_at(clauses: &[Clause], level: RiskLevel) -> u32 {
    clauses.iter().filter(|c| c.risk == level).count() as u32
}

/// Risk score from clause counts: 30 per high, 10 per medium, capped at 100.
pub fn clause_risk_score(clauses: &[Clause]) -> RiskScore {
    let high = count_at(clauses, RiskLevel::High);
    let medium = count_at(clauses, RiskLevel::Medium);
    RiskScore {
        score: f64::from((high * 30 + medium * 10).min(100)),
        reason: format!("{high} high-risk and {medium} medium-risk clauses"),
    }
}

/// Disclaimer presence by keyword.
pub fn detect_disclaimer(content: &str) -> DisclaimerCheck {
    let lower = content.to_lowercase();
    match DISCLAIMER_MARKERS.iter().find(|m| lower.contains(*m)) {
        Some(marker) => DisclaimerCheck {
            present: true,
            reason: format!("found '{marker}'"),
        },
        None => DisclaimerCheck {
            present: false,
            reason: "no disclaimer language found".to_owned(),
        },
    }
}

fn score_input(ctx: &OrchestrationContext) -> Value {
    let set = clauses(ctx);
    json!({
        "clauses": set,
        "precomputed": clause_risk_score(set),
    })
}

fn disclaimer_input(ctx: &OrchestrationContext) -> Value {
    let content = &ctx.section().content;
    json!({
        "content": content,
        "precomputed": detect_disclaimer(content),
    })
}

fn legal_input(ctx: &OrchestrationContext) -> Value {
    let score = risk_score(ctx)
        .filter(|s| !s.is_degraded())
        .map(|s| s.score.round() as u32);
    json!({
        "reason": ctx.decision().map_or("", |d| d.reason.as_str()),
        "risk_score": score,
        "clauses": clauses(ctx),
        "findings": review_findings(ctx).map(|r| r.findings.clone()).unwrap_or_default(),
    })
}

fn negotiation_input(ctx: &OrchestrationContext) -> Value {
    json!({ "clauses": clauses(ctx) })
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Decides `escalate_legal` / `negotiate_terms` / `acceptable_risk` /
/// `ready_to_sign`. A degraded risk score is reported but never counted.
/// Without review findings a re-run is recommended and ready to sign drops
/// to [`UNREVIEWED_CONFIDENCE`](super::UNREVIEWED_CONFIDENCE).
#[derive(Clone, Copy, Debug, Default)]
pub struct ContractAnalyzer;

impl DecisionAnalyzer for ContractAnalyzer {
    fn analyze(&self, ctx: &OrchestrationContext) -> AnalyzerVerdict {
        let set = clauses(ctx);
        let high_clauses = count_at(set, RiskLevel::High);
        let medium_clauses = count_at(set, RiskLevel::Medium);
        let findings = review_findings(ctx)
            .map(|r| r.findings.as_slice())
            .unwrap_or_default();
        let [critical, high, medium, low] = severity_tally(findings);

        let mut triggers = Vec::new();
        let score = match risk_score(ctx) {
            Some(s) if s.is_degraded() => {
                triggers.push("risk_score_degraded");
                None
            }
            Some(s) => Some(s.score),
            None => None,
        };
        let score_at_least = |threshold: f64| score.is_some_and(|s| s >= threshold);
        let score_text = score.map_or_else(|| "n/a".to_owned(), |s| format!("{s:.0}"));

        let risky_titles = |min: RiskLevel| -> Vec<String> {
            set.iter()
                .filter(|c| c.risk >= min)
                .map(|c| format!("{}: {}", c.id, c.title))
                .collect()
        };

        let mut decision = if critical > 0 || score_at_least(ESCALATION_SCORE) {
            if critical > 0 {
                triggers.push("critical_finding");
            }
            if score_at_least(ESCALATION_SCORE) {
                triggers.push("risk_score_escalation");
            }
            Decision {
                next_action: NextAction::EscalateLegal,
                reason: format!(
                    "{critical} critical finding(s), risk score {score_text}"
                ),
                confidence: 0.9,
                recommended_actions: vec!["Route to legal counsel before signing".to_owned()],
                blocking_issues: risky_titles(RiskLevel::High),
            }
        } else if high_clauses >= 2 || high > 0 || score_at_least(NEGOTIATION_SCORE) {
            if high_clauses >= 2 {
                triggers.push("high_risk_clauses");
            }
            if high > 0 {
                triggers.push("high_finding");
            }
            if score_at_least(NEGOTIATION_SCORE) {
                triggers.push("risk_score_negotiation");
            }
            Decision {
                next_action: NextAction::NegotiateTerms,
                reason: format!(
                    "{high_clauses} high-risk clause(s), {high} high-severity finding(s), risk score {score_text}"
                ),
                confidence: 0.8,
                recommended_actions: risky_titles(RiskLevel::Medium)
                    .into_iter()
                    .map(|t| format!("Negotiate {t}"))
                    .collect(),
                blocking_issues: Vec::new(),
            }
        } else if high_clauses > 0
            || medium_clauses > 0
            || medium > 0
            || score_at_least(ACCEPTABLE_SCORE)
        {
            triggers.push("moderate_risk");
            Decision {
                next_action: NextAction::AcceptableRisk,
                reason: format!(
                    "{} clause(s) above low risk, risk score {score_text}",
                    high_clauses + medium_clauses
                ),
                confidence: 0.75,
                recommended_actions: vec!["Note the flagged clauses in the file".to_owned()],
                blocking_issues: Vec::new(),
            }
        } else {
            triggers.push("low_risk");
            Decision {
                next_action: NextAction::ReadyToSign,
                reason: "No material contract risk found".to_owned(),
                confidence: 0.9,
                recommended_actions: Vec::new(),
                blocking_issues: Vec::new(),
            }
        };

        if let Some(check) = disclaimer(ctx)
            && !check.present
            && !check.is_degraded()
        {
            triggers.push("disclaimer_missing");
            decision
                .recommended_actions
                .push("Add a disclaimer to the document".to_owned());
        }
        match review_findings(ctx) {
            None => {
                triggers.push("review_unavailable");
                flag_unreviewed(&mut decision, NextAction::ReadyToSign);
            }
            Some(r) if r.degraded => triggers.push("review_degraded"),
            Some(_) => {}
        }

        let mut severity_counts: BTreeMap<String, u32> = [
            ("critical", critical),
            ("high", high),
            ("medium", medium),
            ("low", low),
            ("high_risk_clauses", high_clauses),
            ("medium_risk_clauses", medium_clauses),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();
        if let Some(s) = score {
            let _ = severity_counts.insert("risk_score".to_owned(), s.round() as u32);
        }

        AnalyzerVerdict {
            decision,
            severity_counts,
            branch_triggers: triggers.into_iter().map(String::from).collect(),
        }
    }
}
