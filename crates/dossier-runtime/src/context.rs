//! Run-scoped accumulator.
//!
//! One [`OrchestrationContext`] belongs to exactly one run. It only moves
//! forward by folding a [`StepDelta`] or an [`AnalyzerVerdict`] into it; both
//! `apply_*` methods consume the context and return the next one.

use std::collections::BTreeMap;

use dossier_core::TraceId;
use serde::{Deserialize, Serialize};

use crate::artifacts::Artifact;
use crate::types::{
    Decision, ExecutionLog, InputSection, NextAction, PlanStatus, ReviewOptions, Signals,
    SkipReason, StepError, StepExecutionResult,
};

/// Outcome of one step, ready to fold into the context.
#[derive(Clone, Debug, PartialEq)]
pub enum StepDelta {
    /// Step ran and its output parsed as the declared artifact.
    Completed {
        /// Execution record.
        result: StepExecutionResult,
        /// Key to store the artifact under.
        artifact_key: String,
        /// Parsed artifact.
        artifact: Artifact,
    },
    /// Step ran and failed.
    Failed {
        /// Execution record.
        result: StepExecutionResult,
        /// Whether the failure aborts the run.
        critical: bool,
    },
    /// Step did not run.
    Skipped {
        /// Step id.
        step_id: String,
        /// Why.
        reason: SkipReason,
    },
}

/// Analyzer output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerVerdict {
    /// The decision.
    pub decision: Decision,
    /// Count per label.
    pub severity_counts: BTreeMap<String, u32>,
    /// Labels of the conditions that drove the decision.
    pub branch_triggers: Vec<String>,
}

/// Final state of one declared step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepProgress {
    /// Status.
    pub status: PlanStatus,
    /// Set for skipped steps.
    pub skip_reason: Option<SkipReason>,
}

/// Everything one run has accumulated so far.
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestrationContext {
    trace_id: TraceId,
    flow_id: String,
    document_id: String,
    section: InputSection,
    options: ReviewOptions,
    artifacts: BTreeMap<String, Artifact>,
    execution: ExecutionLog,
    signals: Signals,
    decision: Option<Decision>,
    progress: BTreeMap<String, StepProgress>,
}

impl OrchestrationContext {
    /// Fresh context for one run.
    pub fn new(
        trace_id: TraceId,
        flow_id: impl Into<String>,
        document_id: impl Into<String>,
        section: InputSection,
        options: ReviewOptions,
    ) -> Self {
        Self {
            trace_id,
            flow_id: flow_id.into(),
            document_id: document_id.into(),
            section,
            options,
            artifacts: BTreeMap::new(),
            execution: ExecutionLog::default(),
            signals: Signals::default(),
            decision: None,
            progress: BTreeMap::new(),
        }
    }

    /// Fold one step outcome in.
    #[must_use]
    pub fn apply_step(mut self, delta: StepDelta) -> Self {
        match delta {
            StepDelta::Completed {
                result,
                artifact_key,
                artifact,
            } => {
                self.mark(&result.step_id, PlanStatus::Completed, None);
                let _ = self.artifacts.insert(artifact_key, artifact);
                self.execution.steps.push(result);
            }
            StepDelta::Failed { result, critical } => {
                self.mark(&result.step_id, PlanStatus::Failed, None);
                self.execution.errors.push(StepError {
                    step_id: result.step_id.clone(),
                    message: result.error.clone().unwrap_or_default(),
                    critical,
                });
                self.execution.steps.push(result);
            }
            StepDelta::Skipped { step_id, reason } => {
                self.mark(&step_id, PlanStatus::Skipped, Some(reason));
            }
        }
        self
    }

    /// Fold the analyzer verdict in.
    #[must_use]
    pub fn apply_verdict(mut self, verdict: AnalyzerVerdict) -> Self {
        self.signals.severity_counts.extend(verdict.severity_counts);
        self.signals.branch_triggers.extend(verdict.branch_triggers);
        self.decision = Some(verdict.decision);
        self
    }

    fn mark(&mut self, step_id: &str, status: PlanStatus, skip_reason: Option<SkipReason>) {
        let _ = self
            .progress
            .insert(step_id.to_owned(), StepProgress { status, skip_reason });
    }

    /// Parent trace id.
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Flow id.
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    /// Document id.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Section under review.
    pub fn section(&self) -> &InputSection {
        &self.section
    }

    /// Run options.
    pub fn options(&self) -> &ReviewOptions {
        &self.options
    }

    /// Artifacts by key.
    pub fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    /// Artifact stored under `key`.
    pub fn artifact(&self, key: &str) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Execution log.
    pub fn execution(&self) -> &ExecutionLog {
        &self.execution
    }

    /// Signals.
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Decision, once the analyzer has run.
    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    /// Shorthand for the decision's next action.
    pub fn next_action(&self) -> Option<NextAction> {
        self.decision.as_ref().map(|d| d.next_action)
    }

    /// Final state of `step_id`, if it was reached.
    pub fn progress(&self, step_id: &str) -> Option<StepProgress> {
        self.progress.get(step_id).copied()
    }

    /// Ids of steps that ran, in order.
    pub fn executed_step_ids(&self) -> Vec<String> {
        self.execution.steps.iter().map(|s| s.step_id.clone()).collect()
    }

    /// Sum of tokens across executed steps.
    pub fn total_tokens(&self) -> u64 {
        self.execution.steps.iter().map(|s| s.tokens).sum()
    }

    /// Unpack into the parts a response needs.
    pub(crate) fn into_parts(
        self,
    ) -> (
        ExecutionLog,
        BTreeMap<String, Artifact>,
        Signals,
        Option<Decision>,
    ) {
        (self.execution, self.artifacts, self.signals, self.decision)
    }
}
