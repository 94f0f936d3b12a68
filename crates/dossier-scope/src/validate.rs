//! Plan validation and the conservative fallback.
//!
//! Callers that feed a review pipeline use [`plan_review_scope_or_fallback`]:
//! planner errors, panics and invalid plans all degrade to [`fallback_plan`].

use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use dossier_core::metrics::SCOPE_PLANS_TOTAL;
use dossier_core::panic::panic_message;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Result, ScopeError};
use crate::planner::{
    COMPLIANCE_AGENT, PlannerConfig, ReviewMode, ScopeAnalysis, ScopePlan, Section,
    plan_review_scope,
};
use crate::queue::DirtyQueue;

/// Confidence of the fallback plan.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Check `plan` against the document's sections.
pub fn validate_scope_plan(plan: &ScopePlan, sections: &[Section]) -> Result<()> {
    if plan.sections_to_review.is_empty() {
        return Err(ScopeError::NoSections);
    }
    let known: BTreeSet<u32> = sections.iter().map(|s| s.id).collect();
    if let Some(id) = plan
        .sections_to_review
        .iter()
        .chain(&plan.related_sections)
        .find(|id| !known.contains(id))
    {
        return Err(ScopeError::UnknownSection(*id));
    }
    if plan.agents_to_invoke.is_empty() {
        return Err(ScopeError::NoAgents);
    }
    // Mode must survive its own wire name.
    let _: ReviewMode = plan.review_mode.as_str().parse()?;
    Ok(())
}

/// Minimal plan: dirty sections only, compliance only, no global checks.
///
/// An empty queue gives an empty `sections_to_review`, which
/// [`validate_scope_plan`] would reject; [`plan_review_scope_or_fallback`]
/// reports that case as [`ScopeOutcome::nothing_to_review`].
pub fn fallback_plan(queue: &DirtyQueue, config: &PlannerConfig, reason: &str) -> ScopePlan {
    let sections = queue.section_ids();
    ScopePlan {
        review_mode: ReviewMode::SectionOnly,
        reasoning: format!("Fallback scope: {reason}"),
        estimated_duration_ms: config.estimate_duration_ms(ReviewMode::SectionOnly, sections.len()),
        sections_to_review: sections,
        related_sections: Vec::new(),
        agents_to_invoke: vec![COMPLIANCE_AGENT.to_owned()],
        global_checks: Vec::new(),
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// A plan that is safe to act on. An empty dirty queue gives an empty plan
/// with `nothing_to_review` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeOutcome {
    /// Plan to execute.
    pub scope_plan: ScopePlan,
    /// Planner analysis; absent for fallbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ScopeAnalysis>,
    /// Why the fallback was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// No dirty sections were queued; the plan lists no sections.
    #[serde(default)]
    pub nothing_to_review: bool,
}

impl ScopeOutcome {
    /// Whether the fallback plan was substituted.
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Plan, validate, and fall back on any failure. Never errors or panics.
pub fn plan_review_scope_or_fallback(
    queue: &DirtyQueue,
    sections: &[Section],
    config: &PlannerConfig,
) -> ScopeOutcome {
    let planned = catch_unwind(AssertUnwindSafe(|| plan_review_scope(queue, sections, config)))
        .unwrap_or_else(|payload| Err(ScopeError::Panicked(panic_message(&*payload))))
        .and_then(|planning| {
            validate_scope_plan(&planning.scope_plan, sections)?;
            Ok(planning)
        });

    match planned {
        Ok(planning) => {
            counter!(SCOPE_PLANS_TOTAL, "outcome" => "planned").increment(1);
            debug!(
                mode = %planning.scope_plan.review_mode,
                rule = planning.analysis.rule,
                sections = planning.scope_plan.sections_to_review.len(),
                "scope planned"
            );
            ScopeOutcome {
                scope_plan: planning.scope_plan,
                analysis: Some(planning.analysis),
                fallback_reason: None,
                nothing_to_review: false,
            }
        }
        Err(e) => {
            let reason = e.to_string();
            let nothing_to_review = queue.is_empty();
            if nothing_to_review {
                counter!(SCOPE_PLANS_TOTAL, "outcome" => "empty").increment(1);
                debug!("no dirty sections, nothing to review");
            } else {
                counter!(SCOPE_PLANS_TOTAL, "outcome" => "fallback").increment(1);
                warn!(error = %reason, dirty = queue.count(), "scope planning failed, using fallback plan");
            }
            ScopeOutcome {
                scope_plan: fallback_plan(queue, config, &reason),
                analysis: None,
                fallback_reason: Some(reason),
                nothing_to_review,
            }
        }
    }
}
