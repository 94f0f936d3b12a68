//! Orchestration request, response and execution-log types.
//!
//! All wire types use snake_case field names.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use dossier_core::{ExecutionMode, TraceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifacts::Artifact;

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// The section under review.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSection {
    /// Caller's section id.
    #[serde(default)]
    pub id: String,
    /// Section title.
    #[serde(default)]
    pub title: String,
    /// Section text.
    pub content: String,
}

/// Per-run options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewOptions {
    /// Language of the client draft.
    pub language: String,
    /// Tone of the client draft (`formal` or `friendly`).
    pub tone: String,
    /// Client addressed in the draft.
    pub client_name: Option<String>,
    /// Reviewer named in the audit record.
    pub reviewer_name: Option<String>,
    /// Agent execution mode.
    pub mode: ExecutionMode,
    /// Step ids to skip.
    pub skip_steps: Vec<String>,
    /// Opt skill calls into the remote transport.
    pub remote_skills: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            tone: "formal".to_owned(),
            client_name: None,
            reviewer_name: None,
            mode: ExecutionMode::Fake,
            skip_steps: Vec::new(),
            remote_skills: false,
        }
    }
}

/// One orchestration request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    /// Flow to run.
    pub flow_id: String,
    /// Document under review.
    pub document_id: String,
    /// Sections to review. Exactly one is supported.
    pub sections: Vec<InputSection>,
    /// Run options.
    #[serde(default)]
    pub options: ReviewOptions,
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision
// ─────────────────────────────────────────────────────────────────────────────

/// What should happen next with the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// Compliance: cannot proceed.
    Rejected,
    /// Compliance: client must supply more evidence.
    RequestMoreInfo,
    /// Compliance: passed.
    ReadyToSend,
    /// Contract: needs legal review.
    EscalateLegal,
    /// Contract: terms must change.
    NegotiateTerms,
    /// Contract: acceptable with noted risks.
    AcceptableRisk,
    /// Contract: sign as is.
    ReadyToSign,
}

impl NextAction {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::RequestMoreInfo => "request_more_info",
            Self::ReadyToSend => "ready_to_send",
            Self::EscalateLegal => "escalate_legal",
            Self::NegotiateTerms => "negotiate_terms",
            Self::AcceptableRisk => "acceptable_risk",
            Self::ReadyToSign => "ready_to_sign",
        }
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Outcome.
    pub next_action: NextAction,
    /// Why.
    pub reason: String,
    /// 0.0–1.0.
    pub confidence: f64,
    /// Follow-ups for the reviewer or client.
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    /// Issues that block progress.
    #[serde(default)]
    pub blocking_issues: Vec<String>,
}

impl Decision {
    /// Synthetic decision attached to a failed run.
    pub fn failure(message: &str) -> Self {
        Self {
            next_action: NextAction::Rejected,
            reason: format!("Orchestration failed: {message}"),
            confidence: 0.0,
            recommended_actions: Vec::new(),
            blocking_issues: vec![message.to_owned()],
        }
    }
}

/// Severity counts and branch triggers gathered while deciding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    /// Count per label (`critical`, `violations`, `high_risk_clauses`, …).
    pub severity_counts: BTreeMap<String, u32>,
    /// Labels of the conditions that drove the decision.
    pub branch_triggers: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution log
// ─────────────────────────────────────────────────────────────────────────────

/// Step outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Produced a valid artifact.
    Success,
    /// Failed.
    Error,
}

impl StepStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Record of one executed step. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionResult {
    /// Step id.
    pub step_id: String,
    /// Agent id or skill name.
    pub target: String,
    /// Trace id of the agent or skill call.
    pub trace_id: TraceId,
    /// Outcome.
    pub status: StepStatus,
    /// Wall-clock latency.
    pub latency_ms: u64,
    /// Tokens reported by the agent.
    pub tokens: u64,
    /// Clipped input summary.
    pub input_summary: String,
    /// Clipped output summary.
    pub output_summary: String,
    /// Raw output.
    pub output: Value,
    /// Whether the step succeeded.
    pub ok: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A recorded step failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    /// Step id.
    pub step_id: String,
    /// Failure description.
    pub message: String,
    /// Whether the failure aborted the run.
    pub critical: bool,
}

/// Ordered step results and failures of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Executed steps, in execution order.
    pub steps: Vec<StepExecutionResult>,
    /// Failures, in execution order.
    pub errors: Vec<StepError>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

/// Flow phase a step belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Always runs; may be critical.
    Main,
    /// Runs when its condition holds after the decision.
    Conditional,
    /// Always runs; failures never abort.
    Finalization,
}

impl StepPhase {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Conditional => "conditional",
            Self::Finalization => "finalization",
        }
    }
}

/// Why a step did not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Listed in `skip_steps`.
    SkipSteps,
    /// Its condition was false.
    ConditionNotMet,
}

impl SkipReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipSteps => "skip_steps",
            Self::ConditionNotMet => "condition_not_met",
        }
    }
}

/// Final status of a declared step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Ran and succeeded.
    Completed,
    /// Ran and failed.
    Failed,
    /// Did not run.
    Skipped,
    /// Never reached.
    Pending,
}

/// One declared step and what became of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Step id.
    pub step_id: String,
    /// Phase.
    pub phase: StepPhase,
    /// `agent` or `skill`.
    pub target_kind: String,
    /// Agent id or skill name.
    pub target: String,
    /// Artifact the step writes.
    pub artifact_key: String,
    /// Whether failure aborts the run.
    pub critical: bool,
    /// Outcome.
    pub status: PlanStatus,
    /// Why the step was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Run-level metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Wall-clock latency.
    pub latency_ms: u64,
    /// Sum of step tokens.
    pub total_tokens: u64,
    /// Number of steps that ran.
    pub steps_executed: usize,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub completed_at: DateTime<Utc>,
    /// Agent execution mode.
    pub mode: ExecutionMode,
}

/// Result of one orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    /// `false` when the run failed or was aborted.
    pub ok: bool,
    /// Requested flow.
    pub flow_id: String,
    /// Document under review.
    pub document_id: String,
    /// Parent trace id of the run.
    pub trace_id: TraceId,
    /// Every declared step with its final status.
    pub plan: Vec<PlanEntry>,
    /// Step results and failures.
    pub execution: ExecutionLog,
    /// Artifacts by key.
    pub artifacts: BTreeMap<String, Artifact>,
    /// Branch decision.
    pub decision: Decision,
    /// Severity counts and triggers.
    pub signals: Signals,
    /// Timing and totals.
    pub metadata: RunMetadata,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
