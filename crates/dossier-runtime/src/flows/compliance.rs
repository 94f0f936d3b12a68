//! `compliance-review-v1`: KYC fact extraction, policy mapping and review.

use std::collections::BTreeMap;
use std::sync::Arc;

use dossier_agents::builtin::{
    AdversarialReviewer, AuditRecorder, ClientCommunicator, ComplianceEscalation,
    EvidenceRequester, FactExtractor, PolicyMapper,
};
use dossier_agents::outputs::{FactSheet, PolicyMapping, PolicyStatus, Severity};
use serde_json::{Value, json};

use super::{
    DecisionAnalyzer, FlowDefinition, PlanStep, audit_record_input, client_draft_input,
    content_input, flag_unreviewed, keys, review_findings, review_input, severity_tally,
};
use crate::artifacts::{Artifact, ArtifactKind};
use crate::context::{AnalyzerVerdict, OrchestrationContext};
use crate::errors::RuntimeError;
use crate::types::{Decision, NextAction};

/// Flow id.
pub const FLOW_ID: &str = "compliance-review-v1";

/// Skill that labels the section's topics.
pub const EXTRACT_TOPICS_SKILL: &str = "extract-topics";

/// Phrase → topic label used to precompute `extract-topics`.
const TOPIC_TERMS: &[(&str, &str)] = &[
    ("beneficial owner", "beneficial_ownership"),
    ("source of funds", "source_of_funds"),
    ("sanction", "sanctions"),
    ("jurisdiction", "jurisdiction"),
    ("cash", "cash_activity"),
    ("politically exposed", "pep_exposure"),
    ("offshore", "offshore_structures"),
    ("registration", "corporate_registration"),
];

/// Build the flow.
pub fn definition() -> Result<FlowDefinition, RuntimeError> {
    FlowDefinition::new(
        FLOW_ID,
        vec![
            PlanStep::agent(
                "extract_facts",
                FactExtractor::ID,
                keys::FACTS,
                ArtifactKind::Facts,
                content_input,
            )
            .critical(),
            PlanStep::agent(
                "map_policies",
                PolicyMapper::ID,
                keys::POLICY_MAPPINGS,
                ArtifactKind::PolicyMappings,
                policy_input,
            )
            .critical(),
            PlanStep::agent(
                "adversarial_review",
                AdversarialReviewer::ID,
                keys::REVIEW_FINDINGS,
                ArtifactKind::ReviewFindings,
                review_input,
            ),
            PlanStep::skill(
                "extract_topics",
                EXTRACT_TOPICS_SKILL,
                keys::TOPICS,
                ArtifactKind::Topics,
                topics_input,
            ),
        ],
        vec![
            PlanStep::agent(
                "request_evidence",
                EvidenceRequester::ID,
                keys::EVIDENCE_REQUEST,
                ArtifactKind::EvidenceRequest,
                evidence_input,
            )
            .when(|ctx| ctx.next_action() == Some(NextAction::RequestMoreInfo)),
            PlanStep::agent(
                "escalate_compliance",
                ComplianceEscalation::ID,
                keys::ESCALATION_MEMO,
                ArtifactKind::EscalationMemo,
                escalation_input,
            )
            .when(|ctx| ctx.next_action() == Some(NextAction::Rejected)),
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
        Arc::new(ComplianceAnalyzer),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

fn facts(ctx: &OrchestrationContext) -> Option<&FactSheet> {
    match ctx.artifact(keys::FACTS) {
        Some(Artifact::Facts(f)) => Some(f),
        _ => None,
    }
}

fn mappings(ctx: &OrchestrationContext) -> &[PolicyMapping] {
    match ctx.artifact(keys::POLICY_MAPPINGS) {
        Some(Artifact::PolicyMappings(m)) => &m.mappings,
        _ => &[],
    }
}

fn with_status(ctx: &OrchestrationContext, status: PolicyStatus) -> Vec<&PolicyMapping> {
    mappings(ctx).iter().filter(|m| m.status == status).collect()
}

fn policy_input(ctx: &OrchestrationContext) -> Value {
    json!({ "facts": facts(ctx).cloned().unwrap_or_default() })
}

/// Topic labels whose phrase appears in `content`.
pub fn detect_topics(content: &str) -> Vec<&'static str> {
    let lower = content.to_lowercase();
    TOPIC_TERMS
        .iter()
        .filter(|(phrase, _)| lower.contains(phrase))
        .map(|(_, topic)| *topic)
        .collect()
}

fn topics_input(ctx: &OrchestrationContext) -> Value {
    let section = ctx.section();
    json!({
        "content": section.content,
        "title": section.title,
        "precomputed": { "topics": detect_topics(&section.content) },
    })
}

fn evidence_input(ctx: &OrchestrationContext) -> Value {
    json!({
        "missing_facts": facts(ctx).map(|f| f.missing.clone()).unwrap_or_default(),
        "unclear_policies": with_status(ctx, PolicyStatus::Unclear),
        "findings": review_findings(ctx).map(|r| r.findings.clone()).unwrap_or_default(),
    })
}

fn escalation_input(ctx: &OrchestrationContext) -> Value {
    let decision = ctx.decision();
    json!({
        "reason": decision.map_or("", |d| d.reason.as_str()),
        "blocking_issues": decision.map(|d| d.blocking_issues.clone()).unwrap_or_default(),
        "violations": with_status(ctx, PolicyStatus::Violated),
        "findings": review_findings(ctx).map(|r| r.findings.clone()).unwrap_or_default(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Decides `rejected` / `request_more_info` / `ready_to_send`.
///
/// First match wins:
/// 1. critical finding or critical violation → rejected (0.95)
/// 2. 3+ high findings or any violation → rejected (0.85)
/// 3. missing facts or unclear mappings → request more info (0.8)
/// 4. any high finding → request more info (0.75)
/// 5. otherwise → ready to send (0.9)
///
/// Without review findings a re-run is recommended and ready to send drops
/// to [`UNREVIEWED_CONFIDENCE`](super::UNREVIEWED_CONFIDENCE).
#[derive(Clone, Copy, Debug, Default)]
pub struct ComplianceAnalyzer;

impl DecisionAnalyzer for ComplianceAnalyzer {
    fn analyze(&self, ctx: &OrchestrationContext) -> AnalyzerVerdict {
        let report = review_findings(ctx);
        let findings = report.map(|r| r.findings.as_slice()).unwrap_or_default();
        let [critical, high, medium, low] = severity_tally(findings);

        let violations = with_status(ctx, PolicyStatus::Violated);
        let critical_violations: Vec<&PolicyMapping> = violations
            .iter()
            .copied()
            .filter(|v| v.severity == Severity::Critical)
            .collect();
        let unclear = with_status(ctx, PolicyStatus::Unclear);
        let missing: &[String] = facts(ctx).map(|f| f.missing.as_slice()).unwrap_or_default();

        let messages_at = |severity: Severity| -> Vec<String> {
            findings
                .iter()
                .filter(|f| f.severity == severity)
                .map(|f| f.message.clone())
                .collect()
        };
        let notes = |items: &[&PolicyMapping]| -> Vec<String> {
            items
                .iter()
                .map(|m| format!("{}: {}", m.policy_id, m.note))
                .collect()
        };

        let mut triggers = Vec::new();
        let mut decision = if critical > 0 || !critical_violations.is_empty() {
            if critical > 0 {
                triggers.push("critical_finding");
            }
            if !critical_violations.is_empty() {
                triggers.push("critical_violation");
            }
            let mut blocking = messages_at(Severity::Critical);
            blocking.extend(notes(&critical_violations));
            Decision {
                next_action: NextAction::Rejected,
                reason: format!(
                    "{critical} critical finding(s) and {} critical policy violation(s)",
                    critical_violations.len()
                ),
                confidence: 0.95,
                recommended_actions: vec!["Escalate to the compliance officer".to_owned()],
                blocking_issues: blocking,
            }
        } else if high >= 3 || !violations.is_empty() {
            if high >= 3 {
                triggers.push("high_findings_threshold");
            }
            if !violations.is_empty() {
                triggers.push("policy_violation");
            }
            let mut blocking = notes(&violations);
            blocking.extend(messages_at(Severity::High));
            Decision {
                next_action: NextAction::Rejected,
                reason: format!(
                    "{} policy violation(s) and {high} high-severity finding(s)",
                    violations.len()
                ),
                confidence: 0.85,
                recommended_actions: vec![
                    "Escalate to the compliance officer".to_owned(),
                    "Document remediation for each violation".to_owned(),
                ],
                blocking_issues: blocking,
            }
        } else if !missing.is_empty() || !unclear.is_empty() {
            if !missing.is_empty() {
                triggers.push("missing_facts");
            }
            if !unclear.is_empty() {
                triggers.push("unclear_mappings");
            }
            let mut actions: Vec<String> = missing
                .iter()
                .map(|f| format!("Provide {}", f.replace('_', " ")))
                .collect();
            actions.extend(unclear.iter().map(|m| format!("Clarify {}: {}", m.policy_id, m.note)));
            Decision {
                next_action: NextAction::RequestMoreInfo,
                reason: format!(
                    "{} missing fact(s) and {} unclear policy mapping(s)",
                    missing.len(),
                    unclear.len()
                ),
                confidence: 0.8,
                recommended_actions: actions,
                blocking_issues: Vec::new(),
            }
        } else if high > 0 {
            triggers.push("high_finding");
            Decision {
                next_action: NextAction::RequestMoreInfo,
                reason: format!("{high} high-severity finding(s) need follow-up"),
                confidence: 0.75,
                recommended_actions: messages_at(Severity::High),
                blocking_issues: Vec::new(),
            }
        } else {
            triggers.push("all_checks_passed");
            Decision {
                next_action: NextAction::ReadyToSend,
                reason: "All compliance checks passed".to_owned(),
                confidence: 0.9,
                recommended_actions: Vec::new(),
                blocking_issues: Vec::new(),
            }
        };

        match report {
            None => {
                triggers.push("review_unavailable");
                flag_unreviewed(&mut decision, NextAction::ReadyToSend);
            }
            Some(r) if r.degraded => triggers.push("review_degraded"),
            Some(_) => {}
        }

        let severity_counts: BTreeMap<String, u32> = [
            ("critical", critical),
            ("high", high),
            ("medium", medium),
            ("low", low),
            ("violations", violations.len() as u32),
            ("critical_violations", critical_violations.len() as u32),
            ("unclear_mappings", unclear.len() as u32),
            ("missing_facts", missing.len() as u32),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        AnalyzerVerdict {
            decision,
            severity_counts,
            branch_triggers: triggers.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StepDelta;
    use crate::flows::{RERUN_REVIEW_ACTION, UNREVIEWED_CONFIDENCE};
    use crate::types::{InputSection, ReviewOptions, StepExecutionResult, StepStatus};
    use dossier_agents::outputs::{Finding, FindingsReport, PolicyMappings};
    use dossier_core::TraceId;

    fn ctx_with(artifacts: Vec<(&str, Artifact)>) -> OrchestrationContext {
        artifacts.into_iter().fold(
            OrchestrationContext::new(
                TraceId::new(),
                FLOW_ID,
                "doc-1",
                InputSection::default(),
                ReviewOptions::default(),
            ),
            |ctx, (key, artifact)| {
                ctx.apply_step(StepDelta::Completed {
                    result: StepExecutionResult {
                        step_id: key.to_owned(),
                        target: "test".into(),
                        trace_id: TraceId::new(),
                        status: StepStatus::Success,
                        latency_ms: 0,
                        tokens: 0,
                        input_summary: String::new(),
                        output_summary: String::new(),
                        output: Value::Null,
                        ok: true,
                        error: None,
                    },
                    artifact_key: key.to_owned(),
                    artifact,
                })
            },
        )
    }

    fn finding(severity: Severity) -> Finding {
        Finding {
            code: "X".into(),
            severity,
            message: format!("{severity} issue"),
            excerpt: None,
        }
    }

    fn review(findings: Vec<Finding>) -> (&'static str, Artifact) {
        (
            keys::REVIEW_FINDINGS,
            Artifact::ReviewFindings(FindingsReport {
                findings,
                source: "heuristic".into(),
                degraded: false,
            }),
        )
    }

    fn mapping(id: &str, status: PolicyStatus, severity: Severity) -> PolicyMapping {
        PolicyMapping {
            policy_id: id.into(),
            fact: "f".into(),
            status,
            severity,
            note: "note".into(),
        }
    }

    fn policies(items: Vec<PolicyMapping>) -> (&'static str, Artifact) {
        (
            keys::POLICY_MAPPINGS,
            Artifact::PolicyMappings(PolicyMappings { mappings: items }),
        )
    }

    fn facts_with_missing(missing: &[&str]) -> (&'static str, Artifact) {
        (
            keys::FACTS,
            Artifact::Facts(FactSheet {
                facts: BTreeMap::new(),
                missing: missing.iter().map(|s| (*s).to_owned()).collect(),
            }),
        )
    }

    // ── rules ──

    #[test]
    fn critical_finding_rejects() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![review(vec![finding(Severity::Critical)])]));
        assert_eq!(v.decision.next_action, NextAction::Rejected);
        assert!((v.decision.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(v.branch_triggers, vec!["critical_finding"]);
        assert_eq!(v.decision.blocking_issues, vec!["critical issue"]);
    }

    #[test]
    fn critical_violation_rejects() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![
            review(vec![]),
            policies(vec![mapping("SAN-001", PolicyStatus::Violated, Severity::Critical)]),
        ]));
        assert_eq!(v.decision.next_action, NextAction::Rejected);
        assert_eq!(v.branch_triggers, vec!["critical_violation"]);
        assert_eq!(v.severity_counts["critical_violations"], 1);
    }

    #[test]
    fn three_high_findings_reject() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![review(vec![
            finding(Severity::High),
            finding(Severity::High),
            finding(Severity::High),
        ])]));
        assert_eq!(v.decision.next_action, NextAction::Rejected);
        assert!((v.decision.confidence - 0.85).abs() < f64::EPSILON);
        assert_eq!(v.branch_triggers, vec!["high_findings_threshold"]);
    }

    #[test]
    fn ordinary_violation_rejects() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![
            review(vec![]),
            policies(vec![mapping("AML-001", PolicyStatus::Violated, Severity::High)]),
        ]));
        assert_eq!(v.decision.next_action, NextAction::Rejected);
        assert_eq!(v.branch_triggers, vec!["policy_violation"]);
        assert_eq!(v.decision.blocking_issues, vec!["AML-001: note"]);
    }

    #[test]
    fn missing_facts_request_more_info() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![
            review(vec![]),
            facts_with_missing(&["source_of_funds"]),
            policies(vec![mapping("KYC-003", PolicyStatus::Unclear, Severity::Medium)]),
        ]));
        assert_eq!(v.decision.next_action, NextAction::RequestMoreInfo);
        assert!((v.decision.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(v.branch_triggers, vec!["missing_facts", "unclear_mappings"]);
        assert_eq!(
            v.decision.recommended_actions,
            vec!["Provide source of funds", "Clarify KYC-003: note"]
        );
    }

    #[test]
    fn single_high_finding_requests_more_info() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![review(vec![finding(Severity::High)])]));
        assert_eq!(v.decision.next_action, NextAction::RequestMoreInfo);
        assert!((v.decision.confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn clean_context_is_ready_to_send() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![
            review(vec![finding(Severity::Low)]),
            facts_with_missing(&[]),
        ]));
        assert_eq!(v.decision.next_action, NextAction::ReadyToSend);
        assert_eq!(v.branch_triggers, vec!["all_checks_passed"]);
        assert_eq!(v.severity_counts["low"], 1);
    }

    #[test]
    fn missing_review_is_flagged() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![]));
        assert_eq!(v.decision.next_action, NextAction::ReadyToSend);
        assert_eq!(v.branch_triggers, vec!["all_checks_passed", "review_unavailable"]);
        assert!((v.decision.confidence - UNREVIEWED_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(v.decision.recommended_actions, vec![RERUN_REVIEW_ACTION]);
    }

    #[test]
    fn missing_review_keeps_rejection_confidence() {
        let v = ComplianceAnalyzer.analyze(&ctx_with(vec![policies(vec![mapping(
            "AML-001",
            PolicyStatus::Violated,
            Severity::High,
        )])]));
        assert_eq!(v.decision.next_action, NextAction::Rejected);
        assert!((v.decision.confidence - 0.85).abs() < f64::EPSILON);
        assert_eq!(v.decision.recommended_actions.last().unwrap(), RERUN_REVIEW_ACTION);
    }

    #[test]
    fn verdict_is_deterministic() {
        let build = || {
            ctx_with(vec![
                review(vec![finding(Severity::High), finding(Severity::Medium)]),
                facts_with_missing(&["jurisdiction"]),
            ])
        };
        let a = ComplianceAnalyzer.analyze(&build());
        let b = ComplianceAnalyzer.analyze(&build());
        assert_eq!(a, b);
    }

    // ── inputs ──

    #[test]
    fn detects_topics_case_insensitively() {
        let topics = detect_topics("Source of Funds: CASH deposits via an Offshore vehicle");
        assert_eq!(topics, vec!["source_of_funds", "cash_activity", "offshore_structures"]);
    }

    #[test]
    fn definition_is_valid() {
        let flow = definition().unwrap();
        assert_eq!(flow.id(), FLOW_ID);
        assert_eq!(flow.main_sequence().len(), 4);
        assert!(flow.main_sequence()[0].critical);
        assert!(!flow.main_sequence()[2].critical);
        assert_eq!(flow.conditional_steps().len(), 2);
        assert_eq!(flow.finalization_steps().len(), 2);
    }
}
