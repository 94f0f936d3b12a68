//! External representation of scope planning.
//!
//! Internally sections are numbered (`u32`). Anything that crosses the
//! crate boundary as JSON uses string keys of the form `section-<N>`.
//! Dirty entries for sections the document does not have are discarded and
//! reported before planning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Result, ScopeError};
use crate::planner::{GlobalCheck, PlannerConfig, ScopeAnalysis, ScopePlan, Section};
use crate::queue::DirtyQueue;
use crate::validate::plan_review_scope_or_fallback;

const SECTION_KEY_PREFIX: &str = "section-";

/// External key for section `id`.
pub fn section_key(id: u32) -> String {
    format!("{SECTION_KEY_PREFIX}{id}")
}

/// Parse a `section-<N>` key.
pub fn parse_section_key(key: &str) -> Result<u32> {
    key.strip_prefix(SECTION_KEY_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ScopeError::InvalidSectionKey(key.to_owned()))
}

fn keys(ids: &[u32]) -> Vec<String> {
    ids.iter().copied().map(section_key).collect()
}

fn parse_keys(keys: &[String]) -> Result<Vec<u32>> {
    keys.iter().map(|k| parse_section_key(k)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// A section as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSection {
    /// `section-<N>` key.
    pub id: String,
    /// Section title.
    pub title: String,
}

impl ExternalSection {
    /// Internal form.
    pub fn to_section(&self) -> Result<Section> {
        Ok(Section::new(parse_section_key(&self.id)?, self.title.clone()))
    }
}

/// One edit as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEdit {
    /// `section-<N>` key.
    pub section: String,
    /// Content before the edit.
    #[serde(default)]
    pub before: String,
    /// Content after the edit.
    #[serde(default)]
    pub after: String,
    /// When the edit happened.
    pub edited_at: DateTime<Utc>,
}

/// Fold caller edits into a dirty queue.
pub fn queue_from_edits(edits: &[ExternalEdit]) -> Result<DirtyQueue> {
    edits.iter().try_fold(DirtyQueue::new(), |queue, edit| {
        let id = parse_section_key(&edit.section)?;
        Ok(queue.add(id, &edit.before, &edit.after, edit.edited_at))
    })
}

/// A queue restricted to the document's sections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciledQueue {
    /// Entries whose section exists.
    pub queue: DirtyQueue,
    /// Section ids that were dropped, sorted.
    pub discarded: Vec<u32>,
}

/// Drop dirty entries for sections not in `sections`.
pub fn reconcile_queue(queue: &DirtyQueue, sections: &[Section]) -> ReconciledQueue {
    let known = |id: u32| sections.iter().any(|s| s.id == id);
    let discarded: Vec<u32> = queue
        .section_ids()
        .into_iter()
        .filter(|id| !known(*id))
        .collect();
    for id in &discarded {
        warn!(section = %section_key(*id), "discarding dirty entry for unknown section");
    }
    ReconciledQueue {
        queue: queue.retain(|e| known(e.section_id)),
        discarded,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outputs
// ─────────────────────────────────────────────────────────────────────────────

/// [`ScopePlan`] with string section keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalScopePlan {
    /// `section-only`, `cross-section` or `full-document`.
    pub review_mode: String,
    /// Rationale.
    pub reasoning: String,
    /// Sections to review.
    pub sections_to_review: Vec<String>,
    /// Context sections.
    pub related_sections: Vec<String>,
    /// Agents to run.
    pub agents_to_invoke: Vec<String>,
    /// Document-wide checks.
    pub global_checks: Vec<GlobalCheck>,
    /// Estimated review time.
    pub estimated_duration_ms: u64,
    /// Planner confidence.
    pub confidence: f64,
}

impl From<&ScopePlan> for ExternalScopePlan {
    fn from(plan: &ScopePlan) -> Self {
        Self {
            review_mode: plan.review_mode.as_str().to_owned(),
            reasoning: plan.reasoning.clone(),
            sections_to_review: keys(&plan.sections_to_review),
            related_sections: keys(&plan.related_sections),
            agents_to_invoke: plan.agents_to_invoke.clone(),
            global_checks: plan.global_checks.clone(),
            estimated_duration_ms: plan.estimated_duration_ms,
            confidence: plan.confidence,
        }
    }
}

impl TryFrom<&ExternalScopePlan> for ScopePlan {
    type Error = ScopeError;

    fn try_from(ext: &ExternalScopePlan) -> Result<Self> {
        Ok(Self {
            review_mode: ext.review_mode.parse()?,
            reasoning: ext.reasoning.clone(),
            sections_to_review: parse_keys(&ext.sections_to_review)?,
            related_sections: parse_keys(&ext.related_sections)?,
            agents_to_invoke: ext.agents_to_invoke.clone(),
            global_checks: ext.global_checks.clone(),
            estimated_duration_ms: ext.estimated_duration_ms,
            confidence: ext.confidence,
        })
    }
}

/// Everything a caller needs back from one planning request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalScopeReport {
    /// The plan.
    pub scope_plan: ExternalScopePlan,
    /// Planner analysis; absent for fallbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ScopeAnalysis>,
    /// Why the fallback was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Dirty sections dropped because the document lacks them.
    #[serde(default)]
    pub discarded_sections: Vec<String>,
    /// No dirty sections remained after reconciliation; the plan is empty.
    #[serde(default)]
    pub nothing_to_review: bool,
}

/// Plan from caller-supplied edits and sections.
///
/// Only malformed section keys are errors; planning failures become the
/// fallback plan. When reconciliation leaves no dirty sections the report
/// has `nothing_to_review` set and an empty plan.
pub fn plan_external(
    edits: &[ExternalEdit],
    sections: &[ExternalSection],
    config: &PlannerConfig,
) -> Result<ExternalScopeReport> {
    let sections: Vec<Section> = sections
        .iter()
        .map(ExternalSection::to_section)
        .collect::<Result<_>>()?;
    let reconciled = reconcile_queue(&queue_from_edits(edits)?, &sections);
    let outcome = plan_review_scope_or_fallback(&reconciled.queue, &sections, config);
    Ok(ExternalScopeReport {
        scope_plan: ExternalScopePlan::from(&outcome.scope_plan),
        analysis: outcome.analysis,
        fallback_reason: outcome.fallback_reason,
        discarded_sections: keys(&reconciled.discarded),
        nothing_to_review: outcome.nothing_to_review,
    })
}
