//! Orchestration engine.
//!
//! Runs one flow over one section: main sequence, decision, gated
//! conditional steps, finalization. Steps are awaited strictly in order;
//! concurrent runs share only the immutable registries.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dossier_agents::runner::duration_ceil_ms;
use dossier_agents::{AgentRegistry, run_agent};
use dossier_core::metrics::{
    ORCHESTRATION_RUN_DURATION_SECONDS, ORCHESTRATION_RUNS_TOTAL,
    ORCHESTRATION_STEP_DURATION_SECONDS,
};
use dossier_core::panic::panic_message;
use dossier_core::summary::{DEFAULT_SUMMARY_BYTES, summarize};
use dossier_core::{CorrelationId, TraceId};
use dossier_skills::{SkillCallContext, SkillCatalog, SkillDispatcher, TransportConfig};
use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::artifacts::Artifact;
use crate::context::{OrchestrationContext, StepDelta};
use crate::errors::RuntimeError;
use crate::flows::{FlowDefinition, FlowRegistry, PlanStep, StepTarget};
use crate::observer::{RunEvent, RunObserver, TracingObserver};
use crate::types::{
    Decision, InputSection, OrchestrationRequest, OrchestrationResponse, PlanEntry, PlanStatus,
    RunMetadata, SkipReason, StepExecutionResult, StepPhase, StepStatus,
};

/// Why a run stopped early, with whatever it had accumulated.
struct RunFailure {
    error: RuntimeError,
    context: Option<Box<OrchestrationContext>>,
}

impl From<RuntimeError> for RunFailure {
    fn from(error: RuntimeError) -> Self {
        Self {
            error,
            context: None,
        }
    }
}

/// Raw result of calling a step's target.
struct TargetCall {
    trace_id: TraceId,
    input_summary: String,
    outcome: Result<(Value, u64), String>,
}

/// Multi-step review orchestrator.
pub struct ReviewOrchestrator {
    flows: Arc<FlowRegistry>,
    agents: Arc<AgentRegistry>,
    skills: Arc<SkillDispatcher>,
    observers: Vec<Arc<dyn RunObserver>>,
    /// Parent of every remote skill call's cancellation token.
    shutdown: CancellationToken,
}

impl ReviewOrchestrator {
    /// Orchestrator over the given registries, with no observers.
    pub fn new(
        flows: Arc<FlowRegistry>,
        agents: Arc<AgentRegistry>,
        skills: Arc<SkillDispatcher>,
    ) -> Self {
        Self {
            flows,
            agents,
            skills,
            observers: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Built-in flows, agents and skills with local-only transport defaults
    /// and a [`TracingObserver`].
    pub fn builtin() -> Result<Self, RuntimeError> {
        let skills = SkillDispatcher::new(
            Arc::new(SkillCatalog::builtin()),
            TransportConfig::default(),
        );
        Ok(Self::new(
            Arc::new(FlowRegistry::builtin()?),
            Arc::new(AgentRegistry::builtin()),
            Arc::new(skills),
        )
        .with_observer(Arc::new(TracingObserver)))
    }

    /// Attach an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registered flows.
    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    /// Cancel in-flight remote skill calls. Their steps fall back to the
    /// skill's degraded output.
    pub fn cancel_remote_calls(&self) {
        self.shutdown.cancel();
    }

    /// Run one orchestration.
    ///
    /// Never fails: configuration errors, critical step failures and panics
    /// all come back as a response with `ok = false`.
    #[instrument(skip_all, fields(flow = %request.flow_id, document = %request.document_id))]
    pub async fn orchestrate(&self, request: OrchestrationRequest) -> OrchestrationResponse {
        let start = Instant::now();
        let started_at = Utc::now();
        let trace_id = TraceId::new();
        let flow_id = request.flow_id.clone();
        let document_id = request.document_id.clone();
        let mode = request.options.mode;

        let outcome = AssertUnwindSafe(self.run(&trace_id, request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(RuntimeError::Panicked(panic_message(&*payload)).into())
            });

        let (context, error) = match outcome {
            Ok(ctx) => (Some(ctx), None),
            Err(failure) => {
                warn!(trace_id = %trace_id, error = %failure.error, "orchestration failed");
                (failure.context.map(|c| *c), Some(failure.error.to_string()))
            }
        };

        let plan = self
            .flows
            .get(&flow_id)
            .map(|flow| plan_entries(&flow, context.as_ref()))
            .unwrap_or_default();
        let (execution, artifacts, signals, decision) = match context {
            Some(ctx) => ctx.into_parts(),
            None => Default::default(),
        };
        let (decision, error) = match (decision, error) {
            (Some(decision), None) => (decision, None),
            (_, Some(message)) => (Decision::failure(&message), Some(message)),
            (None, None) => {
                let message = "analyzer produced no decision".to_owned();
                (Decision::failure(&message), Some(message))
            }
        };

        let ok = error.is_none();
        let elapsed = start.elapsed();
        let latency_ms = duration_ceil_ms(elapsed);
        let outcome_label = if ok { "ok" } else { "failed" };
        counter!(ORCHESTRATION_RUNS_TOTAL, "flow" => flow_id.clone(), "outcome" => outcome_label)
            .increment(1);
        histogram!(ORCHESTRATION_RUN_DURATION_SECONDS, "flow" => flow_id.clone())
            .record(elapsed.as_secs_f64());
        self.notify(&RunEvent::RunCompleted {
            trace_id: trace_id.clone(),
            ok,
            latency_ms,
        });

        OrchestrationResponse {
            ok,
            flow_id,
            document_id,
            trace_id,
            plan,
            metadata: RunMetadata {
                latency_ms,
                total_tokens: execution.steps.iter().map(|s| s.tokens).sum(),
                steps_executed: execution.steps.len(),
                started_at,
                completed_at: Utc::now(),
                mode,
            },
            execution,
            artifacts,
            decision,
            signals,
            error,
        }
    }

    async fn run(
        &self,
        trace_id: &TraceId,
        request: OrchestrationRequest,
    ) -> Result<OrchestrationContext, RunFailure> {
        let flow = self.flows.resolve(&request.flow_id)?;
        let OrchestrationRequest {
            flow_id,
            document_id,
            sections,
            options,
        } = request;
        let section = single_section(&document_id, sections)?;

        let mut ctx =
            OrchestrationContext::new(trace_id.clone(), flow_id, document_id, section, options);
        self.notify(&RunEvent::RunStarted {
            trace_id: trace_id.clone(),
            flow_id: ctx.flow_id().to_owned(),
            document_id: ctx.document_id().to_owned(),
        });

        for step in flow.main_sequence() {
            ctx = self.advance(ctx, StepPhase::Main, step).await?;
        }

        let verdict = flow.analyzer().analyze(&ctx);
        self.notify(&RunEvent::DecisionMade {
            trace_id: trace_id.clone(),
            next_action: verdict.decision.next_action,
            confidence: verdict.decision.confidence,
        });
        ctx = ctx.apply_verdict(verdict);

        for step in flow.conditional_steps() {
            ctx = self.advance(ctx, StepPhase::Conditional, step).await?;
        }
        for step in flow.finalization_steps() {
            ctx = self.advance(ctx, StepPhase::Finalization, step).await?;
        }
        Ok(ctx)
    }

    /// Skip, or execute and fold, one step.
    async fn advance(
        &self,
        ctx: OrchestrationContext,
        phase: StepPhase,
        step: &PlanStep,
    ) -> Result<OrchestrationContext, RunFailure> {
        let skip = if ctx.options().skip_steps.contains(&step.id) {
            Some(SkipReason::SkipSteps)
        } else if step.condition.is_some_and(|condition| !condition(&ctx)) {
            Some(SkipReason::ConditionNotMet)
        } else {
            None
        };
        if let Some(reason) = skip {
            debug!(step = %step.id, reason = reason.as_str(), "step skipped");
            let delta = StepDelta::Skipped {
                step_id: step.id.clone(),
                reason,
            };
            self.notify(&step_event(ctx.trace_id(), &delta));
            return Ok(ctx.apply_step(delta));
        }

        self.notify(&RunEvent::StepStarted {
            trace_id: ctx.trace_id().clone(),
            step_id: step.id.clone(),
            phase,
        });
        let critical = step.critical && phase != StepPhase::Finalization;
        let delta = self.execute_step(&ctx, step, critical).await;
        self.notify(&step_event(ctx.trace_id(), &delta));

        let abort = match &delta {
            StepDelta::Failed {
                result,
                critical: true,
            } => Some(RuntimeError::CriticalStep {
                step: step.id.clone(),
                message: result.error.clone().unwrap_or_default(),
            }),
            _ => None,
        };
        let ctx = ctx.apply_step(delta);
        match abort {
            Some(error) => Err(RunFailure {
                error,
                context: Some(Box::new(ctx)),
            }),
            None => Ok(ctx),
        }
    }

    /// Call the step's target and turn the output into a delta. Panics in
    /// input preparation or the target become a failed step.
    async fn execute_step(
        &self,
        ctx: &OrchestrationContext,
        step: &PlanStep,
        critical: bool,
    ) -> StepDelta {
        let start = Instant::now();
        let call = AssertUnwindSafe(self.call_target(ctx, step))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| TargetCall {
                trace_id: TraceId::new(),
                input_summary: String::new(),
                outcome: Err(format!("step panicked: {}", panic_message(&*payload))),
            });
        let elapsed = start.elapsed();

        let (output, tokens, parsed) = match call.outcome {
            Ok((output, tokens)) => {
                let parsed = Artifact::parse(step.artifact_kind, output.clone()).map_err(|e| {
                    format!("output is not a valid '{}' artifact: {e}", step.artifact_kind)
                });
                (output, tokens, parsed)
            }
            Err(message) => (Value::Null, 0, Err(message)),
        };
        let status = if parsed.is_ok() {
            StepStatus::Success
        } else {
            StepStatus::Error
        };
        histogram!(
            ORCHESTRATION_STEP_DURATION_SECONDS,
            "step" => step.id.clone(),
            "status" => status.as_str()
        )
        .record(elapsed.as_secs_f64());

        let result = StepExecutionResult {
            step_id: step.id.clone(),
            target: step.target.name().to_owned(),
            trace_id: call.trace_id,
            status,
            latency_ms: duration_ceil_ms(elapsed),
            tokens,
            input_summary: call.input_summary,
            output_summary: summarize(&output, DEFAULT_SUMMARY_BYTES),
            output,
            ok: parsed.is_ok(),
            error: parsed.as_ref().err().cloned(),
        };
        match parsed {
            Ok(artifact) => StepDelta::Completed {
                result,
                artifact_key: step.artifact_key.clone(),
                artifact,
            },
            Err(_) => StepDelta::Failed { result, critical },
        }
    }

    async fn call_target(&self, ctx: &OrchestrationContext, step: &PlanStep) -> TargetCall {
        let input = (step.prepare_input)(ctx);
        let input_summary = summarize(&input, DEFAULT_SUMMARY_BYTES);
        match &step.target {
            StepTarget::Agent(agent_id) => {
                let envelope = run_agent(&self.agents, agent_id, input, ctx.options().mode).await;
                let outcome = if envelope.ok {
                    Ok((envelope.output, envelope.metadata.tokens))
                } else {
                    Err(envelope
                        .error
                        .unwrap_or_else(|| format!("agent '{agent_id}' failed")))
                };
                TargetCall {
                    trace_id: envelope.trace_id,
                    input_summary,
                    outcome,
                }
            }
            StepTarget::Skill(name) => {
                let trace_id = TraceId::new();
                let call_ctx = SkillCallContext {
                    correlation_id: CorrelationId::for_trace(&trace_id),
                    remote: ctx.options().remote_skills,
                    cancel: self.shutdown.child_token(),
                };
                let outcome = self
                    .skills
                    .invoke_skill(name, &input, &call_ctx)
                    .await
                    .map(|output| (output, 0))
                    .map_err(|e| e.to_string());
                TargetCall {
                    trace_id,
                    input_summary,
                    outcome,
                }
            }
        }
    }

    fn notify(&self, event: &RunEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

impl std::fmt::Debug for ReviewOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewOrchestrator")
            .field("flows", &self.flows)
            .field("agents", &self.agents)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// The request's only section, or [`RuntimeError::InvalidRequest`].
fn single_section(
    document_id: &str,
    sections: Vec<InputSection>,
) -> Result<InputSection, RuntimeError> {
    if document_id.trim().is_empty() {
        return Err(RuntimeError::InvalidRequest(
            "document_id must not be empty".into(),
        ));
    }
    let count = sections.len();
    match <[InputSection; 1]>::try_from(sections) {
        Ok([section]) => Ok(section),
        Err(_) => Err(RuntimeError::InvalidRequest(format!(
            "expected exactly one section, got {count}"
        ))),
    }
}

fn step_event(trace_id: &TraceId, delta: &StepDelta) -> RunEvent {
    let trace_id = trace_id.clone();
    match delta {
        StepDelta::Completed { result, .. } => RunEvent::StepCompleted {
            trace_id,
            step_id: result.step_id.clone(),
            latency_ms: result.latency_ms,
        },
        StepDelta::Failed { result, critical } => RunEvent::StepFailed {
            trace_id,
            step_id: result.step_id.clone(),
            error: result.error.clone().unwrap_or_default(),
            critical: *critical,
        },
        StepDelta::Skipped { step_id, reason } => RunEvent::StepSkipped {
            trace_id,
            step_id: step_id.clone(),
            reason: *reason,
        },
    }
}

/// One entry per declared step; steps the run never reached are pending.
fn plan_entries(flow: &FlowDefinition, ctx: Option<&OrchestrationContext>) -> Vec<PlanEntry> {
    flow.steps()
        .map(|(phase, step)| {
            let progress = ctx.and_then(|c| c.progress(&step.id));
            PlanEntry {
                step_id: step.id.clone(),
                phase,
                target_kind: step.target.kind().to_owned(),
                target: step.target.name().to_owned(),
                artifact_key: step.artifact_key.clone(),
                critical: step.critical,
                status: progress.map_or(PlanStatus::Pending, |p| p.status),
                skip_reason: progress.and_then(|p| p.skip_reason),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn section(content: &str) -> InputSection {
        InputSection {
            content: content.into(),
            ..InputSection::default()
        }
    }

    // ── request validation ──

    #[test]
    fn single_section_is_accepted() {
        let s = single_section("doc-1", vec![section("a")]).unwrap();
        assert_eq!(s.content, "a");
    }

    #[test]
    fn zero_or_many_sections_are_rejected() {
        assert_matches!(
            single_section("doc-1", vec![]),
            Err(RuntimeError::InvalidRequest(ref m)) if m.contains("got 0")
        );
        assert_matches!(
            single_section("doc-1", vec![section("a"), section("b")]),
            Err(RuntimeError::InvalidRequest(ref m)) if m.contains("got 2")
        );
    }

    #[test]
    fn blank_document_id_is_rejected() {
        assert_matches!(
            single_section("  ", vec![section("a")]),
            Err(RuntimeError::InvalidRequest(_))
        );
    }

    // ── plan ──

    #[test]
    fn unreached_steps_are_pending() {
        let flow = crate::flows::compliance::definition().unwrap();
        let plan = plan_entries(&flow, None);
        assert_eq!(plan.len(), 8);
        assert!(plan.iter().all(|e| e.status == PlanStatus::Pending));
        assert_eq!(plan[0].target_kind, "agent");
        assert_eq!(plan[3].target_kind, "skill");
        assert_eq!(plan[4].phase, StepPhase::Conditional);
    }

    #[test]
    fn step_events_mirror_deltas() {
        let trace = TraceId::new();
        let event = step_event(
            &trace,
            &StepDelta::Skipped {
                step_id: "negotiation".into(),
                reason: SkipReason::ConditionNotMet,
            },
        );
        assert_eq!(event.event_type(), "step_skipped");
        assert_eq!(event.trace_id(), &trace);
    }
}
