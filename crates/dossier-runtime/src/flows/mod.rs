//! Declarative review flows.
//!
//! A [`FlowDefinition`] is three ordered step lists plus a
//! [`DecisionAnalyzer`]. Steps are data: a target, the artifact they write,
//! and plain `fn` pointers that build their input and gate their execution.
//! New flow types are new definitions registered in a [`FlowRegistry`]; the
//! engine never changes.

pub mod compliance;
pub mod contract;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dossier_agents::outputs::{Finding, FindingsReport, Severity};
use serde_json::{Value, json};

use crate::artifacts::{Artifact, ArtifactKind};
use crate::context::{AnalyzerVerdict, OrchestrationContext};
use crate::errors::RuntimeError;
use crate::types::{Decision, NextAction, StepPhase};

/// Artifact keys written by the built-in flows.
pub mod keys {
    /// Extracted KYC facts.
    pub const FACTS: &str = "facts";
    /// Policy rule evaluations.
    pub const POLICY_MAPPINGS: &str = "policy_mappings";
    /// Adversarial review findings.
    pub const REVIEW_FINDINGS: &str = "review_findings";
    /// Topic labels.
    pub const TOPICS: &str = "topics";
    /// Evidence request.
    pub const EVIDENCE_REQUEST: &str = "evidence_request";
    /// Contract clauses.
    pub const CLAUSES: &str = "clauses";
    /// Contract risk score.
    pub const RISK_SCORE: &str = "risk_score";
    /// Disclaimer check.
    pub const DISCLAIMER_CHECK: &str = "disclaimer_check";
    /// Escalation memo.
    pub const ESCALATION_MEMO: &str = "escalation_memo";
    /// Negotiation points.
    pub const NEGOTIATION_POINTS: &str = "negotiation_points";
    /// Client draft.
    pub const CLIENT_DRAFT: &str = "client_draft";
    /// Audit record.
    pub const AUDIT_RECORD: &str = "audit_record";
}

// ─────────────────────────────────────────────────────────────────────────────
// Steps
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a step's input from the context.
pub type PrepareInput = fn(&OrchestrationContext) -> Value;

/// Decides whether a conditional step runs.
pub type StepCondition = fn(&OrchestrationContext) -> bool;

/// What a step calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepTarget {
    /// Agent id in the agent registry.
    Agent(String),
    /// Skill name in the skill catalog.
    Skill(String),
}

impl StepTarget {
    /// Agent id or skill name.
    pub fn name(&self) -> &str {
        match self {
            Self::Agent(id) | Self::Skill(id) => id,
        }
    }

    /// `agent` or `skill`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent(_) => "agent",
            Self::Skill(_) => "skill",
        }
    }
}

impl fmt::Display for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// One step of a flow.
#[derive(Clone, Debug)]
pub struct PlanStep {
    /// Unique within the flow.
    pub id: String,
    /// What to call.
    pub target: StepTarget,
    /// Where the output is stored.
    pub artifact_key: String,
    /// Declared output shape.
    pub artifact_kind: ArtifactKind,
    /// Whether failure aborts the run. Ignored for finalization steps.
    pub critical: bool,
    /// Input builder.
    pub prepare_input: PrepareInput,
    /// Gate for conditional steps; `None` always runs.
    pub condition: Option<StepCondition>,
}

impl PlanStep {
    /// Non-critical agent step.
    pub fn agent(
        id: &str,
        agent_id: &str,
        artifact_key: &str,
        artifact_kind: ArtifactKind,
        prepare_input: PrepareInput,
    ) -> Self {
        Self {
            id: id.to_owned(),
            target: StepTarget::Agent(agent_id.to_owned()),
            artifact_key: artifact_key.to_owned(),
            artifact_kind,
            critical: false,
            prepare_input,
            condition: None,
        }
    }

    /// Non-critical skill step.
    pub fn skill(
        id: &str,
        skill_name: &str,
        artifact_key: &str,
        artifact_kind: ArtifactKind,
        prepare_input: PrepareInput,
    ) -> Self {
        Self {
            target: StepTarget::Skill(skill_name.to_owned()),
            ..Self::agent(id, skill_name, artifact_key, artifact_kind, prepare_input)
        }
    }

    /// Mark as critical.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Gate on `condition`.
    #[must_use]
    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Pure decision function over the accumulated artifacts.
///
/// Implementations must not read clocks, ids or randomness: identical
/// contexts give identical verdicts.
pub trait DecisionAnalyzer: Send + Sync {
    /// Derive the decision, severity counts and branch triggers.
    fn analyze(&self, ctx: &OrchestrationContext) -> AnalyzerVerdict;
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow definition
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable description of one review workflow.
pub struct FlowDefinition {
    id: String,
    main_sequence: Vec<PlanStep>,
    conditional_steps: Vec<PlanStep>,
    finalization_steps: Vec<PlanStep>,
    analyzer: Arc<dyn DecisionAnalyzer>,
}

impl FlowDefinition {
    /// Build a flow, checking that step ids and artifact keys are unique.
    pub fn new(
        id: &str,
        main_sequence: Vec<PlanStep>,
        conditional_steps: Vec<PlanStep>,
        finalization_steps: Vec<PlanStep>,
        analyzer: Arc<dyn DecisionAnalyzer>,
    ) -> Result<Self, RuntimeError> {
        let mut step_ids = HashSet::new();
        let mut artifact_keys = HashSet::new();
        for step in main_sequence
            .iter()
            .chain(&conditional_steps)
            .chain(&finalization_steps)
        {
            if !step_ids.insert(step.id.as_str()) {
                return Err(RuntimeError::DuplicateStepId {
                    flow: id.to_owned(),
                    step: step.id.clone(),
                });
            }
            if !artifact_keys.insert(step.artifact_key.as_str()) {
                return Err(RuntimeError::DuplicateArtifactKey {
                    flow: id.to_owned(),
                    key: step.artifact_key.clone(),
                });
            }
        }
        Ok(Self {
            id: id.to_owned(),
            main_sequence,
            conditional_steps,
            finalization_steps,
            analyzer,
        })
    }

    /// Flow id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Steps that always run, in order.
    pub fn main_sequence(&self) -> &[PlanStep] {
        &self.main_sequence
    }

    /// Steps gated on the decision.
    pub fn conditional_steps(&self) -> &[PlanStep] {
        &self.conditional_steps
    }

    /// Steps that always run last.
    pub fn finalization_steps(&self) -> &[PlanStep] {
        &self.finalization_steps
    }

    /// The decision analyzer.
    pub fn analyzer(&self) -> &dyn DecisionAnalyzer {
        self.analyzer.as_ref()
    }

    /// Every step with its phase, in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = (StepPhase, &PlanStep)> {
        self.main_sequence
            .iter()
            .map(|s| (StepPhase::Main, s))
            .chain(self.conditional_steps.iter().map(|s| (StepPhase::Conditional, s)))
            .chain(self.finalization_steps.iter().map(|s| (StepPhase::Finalization, s)))
    }
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("id", &self.id)
            .field(
                "steps",
                &self.steps().map(|(_, s)| s.id.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Flow id → definition.
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<FlowDefinition>>,
}

impl FlowRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the compliance and contract-risk flows.
    pub fn builtin() -> Result<Self, RuntimeError> {
        let mut registry = Self::new();
        registry.register(compliance::definition()?);
        registry.register(contract::definition()?);
        Ok(registry)
    }

    /// Add or replace a flow.
    pub fn register(&mut self, flow: FlowDefinition) {
        let _ = self.flows.insert(flow.id().to_owned(), Arc::new(flow));
    }

    /// Flow by id.
    pub fn get(&self, id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(id).cloned()
    }

    /// Flow by id, or [`RuntimeError::UnknownFlow`].
    pub fn resolve(&self, id: &str) -> Result<Arc<FlowDefinition>, RuntimeError> {
        self.get(id)
            .ok_or_else(|| RuntimeError::UnknownFlow(id.to_owned()))
    }

    /// Registered flow ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRegistry")
            .field("flows", &self.ids())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared inputs
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn content_input(ctx: &OrchestrationContext) -> Value {
    json!({ "content": ctx.section().content })
}

pub(crate) fn review_input(ctx: &OrchestrationContext) -> Value {
    let section = ctx.section();
    let title = (!section.title.is_empty()).then_some(section.title.as_str());
    json!({ "content": section.content, "title": title })
}

pub(crate) fn client_draft_input(ctx: &OrchestrationContext) -> Value {
    let opts = ctx.options();
    let decision = ctx.decision();
    json!({
        "language": opts.language,
        "tone": opts.tone,
        "client_name": opts.client_name,
        "next_action": decision.map_or("", |d| d.next_action.as_str()),
        "reason": decision.map_or("", |d| d.reason.as_str()),
        "recommended_actions": decision.map(|d| d.recommended_actions.clone()).unwrap_or_default(),
    })
}

pub(crate) fn audit_record_input(ctx: &OrchestrationContext) -> Value {
    json!({
        "document_id": ctx.document_id(),
        "flow_id": ctx.flow_id(),
        "next_action": ctx.next_action().map_or("", |a| a.as_str()),
        "reviewer_name": ctx.options().reviewer_name,
        "steps": ctx.executed_step_ids(),
        "artifact_keys": ctx.artifacts().keys().collect::<Vec<_>>(),
    })
}

/// Findings from the review artifact, if the review ran.
pub(crate) fn review_findings(ctx: &OrchestrationContext) -> Option<&FindingsReport> {
    match ctx.artifact(keys::REVIEW_FINDINGS) {
        Some(Artifact::ReviewFindings(report)) => Some(report),
        _ => None,
    }
}

/// Confidence ceiling for a clean outcome reached without review findings.
pub const UNREVIEWED_CONFIDENCE: f64 = 0.7;

/// Recommended when the adversarial review produced nothing.
pub const RERUN_REVIEW_ACTION: &str = "Re-run the adversarial review before relying on this decision";

/// Mark `decision` as reached without the adversarial review. A `clean`
/// outcome is capped at [`UNREVIEWED_CONFIDENCE`].
pub(crate) fn flag_unreviewed(decision: &mut Decision, clean: NextAction) {
    if decision.next_action == clean {
        decision.confidence = decision.confidence.min(UNREVIEWED_CONFIDENCE);
    }
    decision.recommended_actions.push(RERUN_REVIEW_ACTION.to_owned());
}

/// Per-severity finding counts: `[critical, high, medium, low]`.
pub(crate) fn severity_tally(findings: &[Finding]) -> [u32; 4] {
    findings.iter().fold([0; 4], |mut acc, f| {
        let slot = match f.severity {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        };
        acc[slot] += 1;
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decision;
    use assert_matches::assert_matches;

    struct Fixed;

    impl DecisionAnalyzer for Fixed {
        fn analyze(&self, _ctx: &OrchestrationContext) -> AnalyzerVerdict {
            AnalyzerVerdict {
                decision: Decision::failure("fixed"),
                severity_counts: Default::default(),
                branch_triggers: vec![],
            }
        }
    }

    fn step(id: &str, key: &str) -> PlanStep {
        PlanStep::agent(id, "fact-extractor", key, ArtifactKind::Facts, content_input)
    }

    // ── definition ──

    #[test]
    fn duplicate_artifact_key_across_phases_is_rejected() {
        let err = FlowDefinition::new(
            "f",
            vec![step("a", "facts")],
            vec![],
            vec![step("b", "facts")],
            Arc::new(Fixed),
        )
        .unwrap_err();
        assert_matches!(err, RuntimeError::DuplicateArtifactKey { ref key, .. } if key == "facts");
    }

    #[test]
    fn duplicate_step_id_is_rejected() {
        let err = FlowDefinition::new(
            "f",
            vec![step("a", "x")],
            vec![step("a", "y")],
            vec![],
            Arc::new(Fixed),
        )
        .unwrap_err();
        assert_matches!(err, RuntimeError::DuplicateStepId { ref step, .. } if step == "a");
    }

    #[test]
    fn steps_iterate_in_phase_order() {
        let flow = FlowDefinition::new(
            "f",
            vec![step("a", "1")],
            vec![step("b", "2")],
            vec![step("c", "3")],
            Arc::new(Fixed),
        )
        .unwrap();
        let phases: Vec<_> = flow.steps().map(|(p, s)| (p, s.id.clone())).collect();
        assert_eq!(
            phases,
            vec![
                (StepPhase::Main, "a".into()),
                (StepPhase::Conditional, "b".into()),
                (StepPhase::Finalization, "c".into()),
            ]
        );
    }

    #[test]
    fn skill_step_targets_skill() {
        let s = PlanStep::skill("t", "extract-topics", "topics", ArtifactKind::Topics, content_input);
        assert_eq!(s.target, StepTarget::Skill("extract-topics".into()));
        assert_eq!(s.target.to_string(), "skill:extract-topics");
        assert!(!s.critical);
    }

    // ── registry ──

    #[test]
    fn builtin_registry_has_both_flows() {
        let registry = FlowRegistry::builtin().unwrap();
        assert_eq!(
            registry.ids(),
            vec!["compliance-review-v1", "contract-risk-review-v1"]
        );
    }

    #[test]
    fn unknown_flow_is_error() {
        let registry = FlowRegistry::builtin().unwrap();
        assert_matches!(registry.resolve("nope"), Err(RuntimeError::UnknownFlow(_)));
    }
}
