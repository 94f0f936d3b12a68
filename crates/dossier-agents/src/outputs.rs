//! Typed payloads produced by the built-in agents.
//!
//! Handlers serialize these into their JSON output; the runtime parses the
//! same JSON back into its artifact enum, so both sides share one schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Severity scales
// ─────────────────────────────────────────────────────────────────────────────

/// Finding severity. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs attention.
    Medium,
    /// Blocks approval without follow-up.
    High,
    /// Blocks approval outright.
    Critical,
}

impl Severity {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract clause risk level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Standard boilerplate.
    Low,
    /// Worth a second look.
    Medium,
    /// Unfavourable or unusual terms.
    High,
}

impl RiskLevel {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compliance payloads
// ─────────────────────────────────────────────────────────────────────────────

/// KYC facts pulled from a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSheet {
    /// Fact name → value, for every recognised fact that was present.
    pub facts: BTreeMap<String, String>,
    /// Required facts that were not found.
    pub missing: Vec<String>,
}

/// Outcome of checking one policy against the extracted facts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// The policy is met.
    Satisfied,
    /// The policy is broken.
    Violated,
    /// Not enough information to decide.
    Unclear,
}

/// One policy rule evaluated against the facts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMapping {
    /// Rule id, e.g. `KYC-003`.
    pub policy_id: String,
    /// Fact the rule reads.
    pub fact: String,
    /// Evaluation outcome.
    pub status: PolicyStatus,
    /// Severity when the rule is not satisfied.
    pub severity: Severity,
    /// Human-readable explanation.
    pub note: String,
}

/// All policy evaluations for a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMappings {
    /// Evaluations in rule order.
    pub mappings: Vec<PolicyMapping>,
}

/// A single review finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable finding code, e.g. `shell_company`.
    pub code: String,
    /// How severe the finding is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Matched text, when the finding comes from the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Findings from an adversarial review pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsReport {
    /// Findings in content order.
    pub findings: Vec<Finding>,
    /// `heuristic` or `model`.
    pub source: String,
    /// The preferred reviewer failed and this report came from the fallback.
    #[serde(default)]
    pub degraded: bool,
}

/// Follow-up evidence to request from the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// What is being requested.
    pub topic: String,
    /// Why it is needed.
    pub reason: String,
}

/// Evidence request sent when a review cannot conclude.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRequest {
    /// Requested items.
    pub items: Vec<EvidenceItem>,
    /// Response deadline in days.
    pub due_in_days: u32,
}

/// Escalation memo for a compliance officer or legal counsel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationMemo {
    /// `compliance` or `legal`.
    pub audience: String,
    /// Memo priority.
    pub priority: Severity,
    /// One-line summary.
    pub summary: String,
    /// Issues that triggered the escalation.
    pub issues: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Contract payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One contract clause with its assessed risk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// `clause-<n>`, 1-based.
    pub id: String,
    /// Heading or leading words.
    pub title: String,
    /// Assessed risk.
    pub risk: RiskLevel,
    /// Why the risk level was assigned.
    pub rationale: String,
    /// Clause wording, clipped.
    #[serde(default)]
    pub text: String,
}

/// Clauses extracted from a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSet {
    /// Clauses in document order.
    pub clauses: Vec<Clause>,
}

/// A proposed change to a risky clause.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationPoint {
    /// Clause being negotiated.
    pub clause_id: String,
    /// Preferred outcome.
    pub ask: String,
    /// Acceptable compromise.
    pub fallback: String,
}

/// Negotiation positions for the risky clauses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationPoints {
    /// Points in clause order.
    pub points: Vec<NegotiationPoint>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Finalization payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Draft message to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDraft {
    /// Language code the draft is written in.
    pub language: String,
    /// `formal` or `friendly`.
    pub tone: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

/// Audit entry summarising a completed review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Reviewed document.
    pub document_id: String,
    /// Flow that ran.
    pub flow_id: String,
    /// Decision taken.
    pub next_action: String,
    /// Reviewer, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    /// Step ids executed before this record.
    pub steps: Vec<String>,
    /// Artifact keys present before this record.
    pub artifact_keys: Vec<String>,
    /// Hex digest over the fields above.
    pub digest: String,
}
