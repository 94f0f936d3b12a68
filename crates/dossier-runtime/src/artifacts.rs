//! Typed step artifacts.
//!
//! Every step declares the [`ArtifactKind`] it produces. The engine parses the
//! step's raw JSON output into the matching [`Artifact`] variant; a shape
//! mismatch fails the step.

use std::fmt;

use dossier_agents::outputs::{
    AuditRecord, ClauseSet, ClientDraft, EscalationMemo, EvidenceRequest, FactSheet,
    FindingsReport, NegotiationPoints, PolicyMappings,
};
use dossier_skills::catalog::DEGRADED_PREFIX;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Topics found in a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    /// Topic labels.
    pub topics: Vec<String>,
}

/// Overall contract risk score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// 0–100.
    pub score: f64,
    /// How the score was reached.
    pub reason: String,
}

impl RiskScore {
    /// Whether this is a transport fallback rather than a real score.
    pub fn is_degraded(&self) -> bool {
        self.reason.starts_with(DEGRADED_PREFIX)
    }
}

/// Result of the disclaimer check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclaimerCheck {
    /// Whether a disclaimer was found.
    pub present: bool,
    /// Explanation.
    pub reason: String,
}

impl DisclaimerCheck {
    /// Whether this is a transport fallback rather than a real check.
    pub fn is_degraded(&self) -> bool {
        self.reason.starts_with(DEGRADED_PREFIX)
    }
}

/// Declared shape of a step's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// [`FactSheet`].
    Facts,
    /// [`PolicyMappings`].
    PolicyMappings,
    /// [`FindingsReport`].
    ReviewFindings,
    /// [`Topics`].
    Topics,
    /// [`EvidenceRequest`].
    EvidenceRequest,
    /// [`ClauseSet`].
    Clauses,
    /// [`RiskScore`].
    RiskScore,
    /// [`DisclaimerCheck`].
    DisclaimerCheck,
    /// [`EscalationMemo`].
    EscalationMemo,
    /// [`NegotiationPoints`].
    NegotiationPoints,
    /// [`ClientDraft`].
    ClientDraft,
    /// [`AuditRecord`].
    AuditRecord,
}

impl ArtifactKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Facts => "facts",
            Self::PolicyMappings => "policy_mappings",
            Self::ReviewFindings => "review_findings",
            Self::Topics => "topics",
            Self::EvidenceRequest => "evidence_request",
            Self::Clauses => "clauses",
            Self::RiskScore => "risk_score",
            Self::DisclaimerCheck => "disclaimer_check",
            Self::EscalationMemo => "escalation_memo",
            Self::NegotiationPoints => "negotiation_points",
            Self::ClientDraft => "client_draft",
            Self::AuditRecord => "audit_record",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored output of one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Artifact {
    /// KYC facts.
    Facts(FactSheet),
    /// Policy rule evaluations.
    PolicyMappings(PolicyMappings),
    /// Adversarial review findings.
    ReviewFindings(FindingsReport),
    /// Topic labels.
    Topics(Topics),
    /// Evidence the client must supply.
    EvidenceRequest(EvidenceRequest),
    /// Contract clauses with risk levels.
    Clauses(ClauseSet),
    /// Contract risk score.
    RiskScore(RiskScore),
    /// Disclaimer presence.
    DisclaimerCheck(DisclaimerCheck),
    /// Escalation memo.
    EscalationMemo(EscalationMemo),
    /// Negotiation positions.
    NegotiationPoints(NegotiationPoints),
    /// Client-facing message.
    ClientDraft(ClientDraft),
    /// Audit trail entry.
    AuditRecord(AuditRecord),
}

impl Artifact {
    /// Parse `output` as `kind`.
    pub fn parse(kind: ArtifactKind, output: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ArtifactKind::Facts => Self::Facts(serde_json::from_value(output)?),
            ArtifactKind::PolicyMappings => Self::PolicyMappings(serde_json::from_value(output)?),
            ArtifactKind::ReviewFindings => Self::ReviewFindings(serde_json::from_value(output)?),
            ArtifactKind::Topics => Self::Topics(serde_json::from_value(output)?),
            ArtifactKind::EvidenceRequest => Self::EvidenceRequest(serde_json::from_value(output)?),
            ArtifactKind::Clauses => Self::Clauses(serde_json::from_value(output)?),
            ArtifactKind::RiskScore => Self::RiskScore(serde_json::from_value(output)?),
            ArtifactKind::DisclaimerCheck => Self::DisclaimerCheck(serde_json::from_value(output)?),
            ArtifactKind::EscalationMemo => Self::EscalationMemo(serde_json::from_value(output)?),
            ArtifactKind::NegotiationPoints => {
                Self::NegotiationPoints(serde_json::from_value(output)?)
            }
            ArtifactKind::ClientDraft => Self::ClientDraft(serde_json::from_value(output)?),
            ArtifactKind::AuditRecord => Self::AuditRecord(serde_json::from_value(output)?),
        })
    }

    /// Kind of this artifact.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Facts(_) => ArtifactKind::Facts,
            Self::PolicyMappings(_) => ArtifactKind::PolicyMappings,
            Self::ReviewFindings(_) => ArtifactKind::ReviewFindings,
            Self::Topics(_) => ArtifactKind::Topics,
            Self::EvidenceRequest(_) => ArtifactKind::EvidenceRequest,
            Self::Clauses(_) => ArtifactKind::Clauses,
            Self::RiskScore(_) => ArtifactKind::RiskScore,
            Self::DisclaimerCheck(_) => ArtifactKind::DisclaimerCheck,
            Self::EscalationMemo(_) => ArtifactKind::EscalationMemo,
            Self::NegotiationPoints(_) => ArtifactKind::NegotiationPoints,
            Self::ClientDraft(_) => ArtifactKind::ClientDraft,
            Self::AuditRecord(_) => ArtifactKind::AuditRecord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_declared_kind() {
        let a = Artifact::parse(ArtifactKind::Topics, json!({"topics": ["kyc"]})).unwrap();
        assert_eq!(a.kind(), ArtifactKind::Topics);
        assert_eq!(
            a,
            Artifact::Topics(Topics {
                topics: vec!["kyc".into()]
            })
        );
    }

    #[test]
    fn shape_mismatch_is_error() {
        assert!(Artifact::parse(ArtifactKind::RiskScore, json!({"topics": []})).is_err());
        assert!(Artifact::parse(ArtifactKind::ReviewFindings, json!({})).is_err());
    }

    #[test]
    fn serializes_tagged() {
        let a = Artifact::RiskScore(RiskScore {
            score: 40.0,
            reason: "two risky clauses".into(),
        });
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["kind"], "risk_score");
        assert_eq!(v["data"]["score"], 40.0);
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in [
            ArtifactKind::Facts,
            ArtifactKind::PolicyMappings,
            ArtifactKind::DisclaimerCheck,
            ArtifactKind::AuditRecord,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn degraded_reason_is_detected() {
        let s = RiskScore {
            score: 0.0,
            reason: "[degraded] remote skill unavailable".into(),
        };
        assert!(s.is_degraded());
        let d = DisclaimerCheck {
            present: true,
            reason: "found".into(),
        };
        assert!(!d.is_degraded());
    }
}
