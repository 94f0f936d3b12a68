//! Deterministic review-scope planner.
//!
//! Maps a [`DirtyQueue`] and the document's section list to a [`ScopePlan`].
//! Rules are evaluated in priority order and the first match wins:
//!
//! | # | Condition | Mode |
//! |---|-----------|------|
//! | 1 | heavy edit in a high-risk section | full-document |
//! | 2 | any edit in a high-risk section | full-document |
//! | 3 | 4+ dirty sections | cross-section |
//! | 4 | 2–3 dirty sections, one heavy | cross-section |
//! | 5 | 2–3 dirty sections, none heavy | section-only + disclaimer check |
//! | 6 | one dirty section | section-only |
//!
//! No I/O, no randomness: the same inputs always give the same plan.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScopeError};
use crate::queue::{DirtyQueue, EditMagnitude};

/// Agent that every plan includes.
pub const COMPLIANCE_AGENT: &str = "compliance";
/// Agent added for cross-section or high-risk review.
pub const EVALUATION_AGENT: &str = "evaluation";
/// Agent added for high-risk cross-section review.
pub const ADVERSARIAL_AGENT: &str = "adversarial";

/// Confidence of every plan this planner produces.
pub const PLANNER_CONFIDENCE: f64 = 1.0;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One document section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Section id.
    pub id: u32,
    /// Section title.
    pub title: String,
}

impl Section {
    /// Construct a section.
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// How much of the document to re-review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewMode {
    /// Only the edited sections.
    SectionOnly,
    /// Edited sections and their neighbours.
    CrossSection,
    /// Every section.
    FullDocument,
}

impl ReviewMode {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SectionOnly => "section-only",
            Self::CrossSection => "cross-section",
            Self::FullDocument => "full-document",
        }
    }
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewMode {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "section-only" => Ok(Self::SectionOnly),
            "cross-section" => Ok(Self::CrossSection),
            "full-document" => Ok(Self::FullDocument),
            other => Err(ScopeError::UnknownReviewMode(other.to_owned())),
        }
    }
}

/// Document-wide check added to a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalCheck {
    /// The document still carries its disclaimer.
    DisclaimerPresence,
    /// Section cross-references still resolve.
    CrossReferenceConsistency,
    /// Defined terms are used consistently.
    TerminologyConsistency,
}

impl GlobalCheck {
    /// Every check, in report order.
    pub const ALL: [Self; 3] = [
        Self::DisclaimerPresence,
        Self::CrossReferenceConsistency,
        Self::TerminologyConsistency,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisclaimerPresence => "disclaimer_presence",
            Self::CrossReferenceConsistency => "cross_reference_consistency",
            Self::TerminologyConsistency => "terminology_consistency",
        }
    }
}

impl fmt::Display for GlobalCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to re-review and with which agents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopePlan {
    /// Review breadth.
    pub review_mode: ReviewMode,
    /// Human-readable rationale.
    pub reasoning: String,
    /// Sections to review, sorted.
    pub sections_to_review: Vec<u32>,
    /// Non-dirty sections pulled in as context, sorted.
    pub related_sections: Vec<u32>,
    /// Agents to run.
    pub agents_to_invoke: Vec<String>,
    /// Document-wide checks.
    pub global_checks: Vec<GlobalCheck>,
    /// Estimated review time.
    pub estimated_duration_ms: u64,
    /// 1.0 for planned scopes, 0.5 for the fallback.
    pub confidence: f64,
}

/// Facts the planner derived while choosing a plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeAnalysis {
    /// Rule that matched (1–6).
    pub rule: u8,
    /// Dirty section ids, sorted.
    pub dirty_sections: Vec<u32>,
    /// Dirty sections whose title matched a high-risk keyword.
    pub high_risk_sections: Vec<u32>,
    /// Number of heavy edits.
    pub heavy_edits: usize,
    /// Neighbours of dirty sections that are not dirty themselves.
    pub adjacent_sections: Vec<u32>,
}

/// Planner output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopePlanning {
    /// The plan.
    pub scope_plan: ScopePlan,
    /// How it was reached.
    pub analysis: ScopeAnalysis,
}

/// Fixed duration component per review mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationBase {
    /// Section-only base.
    pub section_only_ms: u64,
    /// Cross-section base.
    pub cross_section_ms: u64,
    /// Full-document base.
    pub full_document_ms: u64,
}

impl DurationBase {
    /// Base for `mode`.
    pub fn for_mode(&self, mode: ReviewMode) -> u64 {
        match mode {
            ReviewMode::SectionOnly => self.section_only_ms,
            ReviewMode::CrossSection => self.cross_section_ms,
            ReviewMode::FullDocument => self.full_document_ms,
        }
    }
}

impl Default for DurationBase {
    fn default() -> Self {
        Self {
            section_only_ms: 2_000,
            cross_section_ms: 5_000,
            full_document_ms: 10_000,
        }
    }
}

/// Planner tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Lowercase title substrings that mark a section high-risk.
    pub high_risk_keywords: Vec<String>,
    /// Agents selected for full-document review.
    pub available_agents: Vec<String>,
    /// Fixed duration per mode.
    pub duration_base: DurationBase,
    /// Duration added per reviewed section.
    pub duration_per_section_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            high_risk_keywords: [
                "disclaimer",
                "liability",
                "risk",
                "termination",
                "governing law",
                "warranty",
                "indemnification",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            available_agents: [COMPLIANCE_AGENT, EVALUATION_AGENT, ADVERSARIAL_AGENT]
                .into_iter()
                .map(String::from)
                .collect(),
            duration_base: DurationBase::default(),
            duration_per_section_ms: 3_000,
        }
    }
}

impl PlannerConfig {
    /// Whether `title` contains a high-risk keyword (case-insensitive).
    pub fn is_high_risk(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.high_risk_keywords
            .iter()
            .any(|k| !k.is_empty() && title.contains(&k.to_lowercase()))
    }

    /// Duration estimate for reviewing `sections` in `mode`.
    pub fn estimate_duration_ms(&self, mode: ReviewMode, sections: usize) -> u64 {
        self.duration_base
            .for_mode(mode)
            .saturating_add(self.duration_per_section_ms.saturating_mul(sections as u64))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Planning
// ─────────────────────────────────────────────────────────────────────────────

/// Plan the review scope for `queue`.
///
/// Dirty ids missing from `sections` are never high-risk and are passed
/// through into the plan; [`crate::validate_scope_plan`] rejects them.
pub fn plan_review_scope(
    queue: &DirtyQueue,
    sections: &[Section],
    config: &PlannerConfig,
) -> Result<ScopePlanning> {
    if queue.is_empty() {
        return Err(ScopeError::EmptyQueue);
    }

    let dirty = queue.section_ids();
    let dirty_set: BTreeSet<u32> = dirty.iter().copied().collect();

    let high_risk: Vec<(u32, &str)> = sections
        .iter()
        .filter(|s| dirty_set.contains(&s.id) && config.is_high_risk(&s.title))
        .map(|s| (s.id, s.title.as_str()))
        .collect();
    let high_risk_ids: BTreeSet<u32> = high_risk.iter().map(|(id, _)| *id).collect();

    let heavy: Vec<u32> = queue
        .entries()
        .iter()
        .filter(|e| e.magnitude == EditMagnitude::Heavy)
        .map(|e| e.section_id)
        .collect();
    let heavy_high_risk = heavy.iter().any(|id| high_risk_ids.contains(id));

    let adjacent = adjacent_sections(&dirty_set, sections);
    let titles = high_risk
        .iter()
        .map(|(_, t)| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let n = dirty.len();

    let (rule, mode, reasoning) = if heavy_high_risk {
        (
            1,
            ReviewMode::FullDocument,
            format!("Heavy edit in high-risk section {titles}; full-document review required"),
        )
    } else if !high_risk.is_empty() {
        (
            2,
            ReviewMode::FullDocument,
            format!("Edit in high-risk section {titles}; full-document review required"),
        )
    } else if n >= 4 {
        (
            3,
            ReviewMode::CrossSection,
            format!("{n} sections edited; reviewing them with adjacent sections"),
        )
    } else if n >= 2 && !heavy.is_empty() {
        (
            4,
            ReviewMode::CrossSection,
            format!("{n} sections edited including a heavy edit; reviewing with adjacent sections"),
        )
    } else if n >= 2 {
        (
            5,
            ReviewMode::SectionOnly,
            format!("{n} sections lightly edited; section review plus disclaimer check"),
        )
    } else {
        (
            6,
            ReviewMode::SectionOnly,
            "Single section edited; section-only review".to_owned(),
        )
    };

    let (sections_to_review, related_sections) = match mode {
        ReviewMode::FullDocument => {
            let mut all: Vec<u32> = sections.iter().map(|s| s.id).collect();
            all.sort_unstable();
            all.dedup();
            (all, Vec::new())
        }
        ReviewMode::CrossSection => {
            let mut merged: Vec<u32> = dirty_set.union(&adjacent).copied().collect();
            merged.sort_unstable();
            (merged, adjacent.iter().copied().collect())
        }
        ReviewMode::SectionOnly => (dirty.clone(), Vec::new()),
    };

    let scope_plan = ScopePlan {
        review_mode: mode,
        reasoning,
        agents_to_invoke: select_agents(mode, !high_risk.is_empty(), config),
        global_checks: select_checks(mode, rule),
        estimated_duration_ms: config.estimate_duration_ms(mode, sections_to_review.len()),
        sections_to_review,
        related_sections,
        confidence: PLANNER_CONFIDENCE,
    };

    Ok(ScopePlanning {
        scope_plan,
        analysis: ScopeAnalysis {
            rule,
            dirty_sections: dirty,
            high_risk_sections: high_risk_ids.into_iter().collect(),
            heavy_edits: heavy.len(),
            adjacent_sections: adjacent.into_iter().collect(),
        },
    })
}

/// Immediate neighbours of each dirty id in the sorted section sequence,
/// minus the dirty ids.
pub fn adjacent_sections(dirty: &BTreeSet<u32>, sections: &[Section]) -> BTreeSet<u32> {
    let mut ids: Vec<u32> = sections.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut adjacent = BTreeSet::new();
    for id in dirty {
        let Ok(pos) = ids.binary_search(id) else {
            continue;
        };
        if pos > 0 {
            let _ = adjacent.insert(ids[pos - 1]);
        }
        if let Some(next) = ids.get(pos + 1) {
            let _ = adjacent.insert(*next);
        }
    }
    adjacent.retain(|id| !dirty.contains(id));
    adjacent
}

fn select_agents(mode: ReviewMode, high_risk: bool, config: &PlannerConfig) -> Vec<String> {
    let names: Vec<&str> = match mode {
        ReviewMode::FullDocument => return config.available_agents.clone(),
        ReviewMode::CrossSection if high_risk => {
            vec![COMPLIANCE_AGENT, EVALUATION_AGENT, ADVERSARIAL_AGENT]
        }
        ReviewMode::CrossSection => vec![COMPLIANCE_AGENT, EVALUATION_AGENT],
        ReviewMode::SectionOnly if high_risk => vec![COMPLIANCE_AGENT, EVALUATION_AGENT],
        ReviewMode::SectionOnly => vec![COMPLIANCE_AGENT],
    };
    names.into_iter().map(String::from).collect()
}

fn select_checks(mode: ReviewMode, rule: u8) -> Vec<GlobalCheck> {
    match mode {
        ReviewMode::FullDocument => GlobalCheck::ALL.to_vec(),
        ReviewMode::CrossSection => vec![GlobalCheck::CrossReferenceConsistency],
        ReviewMode::SectionOnly if rule == 5 => vec![GlobalCheck::DisclaimerPresence],
        ReviewMode::SectionOnly => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn doc() -> Vec<Section> {
        vec![
            Section::new(1, "Introduction"),
            Section::new(2, "Scope of Services"),
            Section::new(3, "Risk Assessment"),
            Section::new(4, "Fees"),
            Section::new(5, "Confidentiality"),
            Section::new(6, "Reporting"),
            Section::new(7, "Appendix A"),
        ]
    }

    const HEAVY: (&str, &str) = ("", "entirely rewritten text");
    const LIGHT: (&str, &str) = ("the same text, mostly", "the same text, mostly.");

    fn plan(queue: &DirtyQueue) -> ScopePlanning {
        plan_review_scope(queue, &doc(), &PlannerConfig::default()).unwrap()
    }

    // ── examples ──

    #[test]
    fn heavy_edit_to_risk_assessment_is_full_document() {
        let q = DirtyQueue::new().add(3, HEAVY.0, HEAVY.1, at(0));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 1);
        assert_eq!(p.scope_plan.review_mode, ReviewMode::FullDocument);
        assert_eq!(
            p.scope_plan.agents_to_invoke,
            vec!["compliance", "evaluation", "adversarial"]
        );
        assert_eq!(p.scope_plan.global_checks, GlobalCheck::ALL.to_vec());
        assert_eq!(p.scope_plan.sections_to_review, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(p.scope_plan.estimated_duration_ms, 10_000 + 7 * 3_000);
    }

    #[test]
    fn light_edit_to_appendix_is_section_only() {
        let q = DirtyQueue::new().add(7, LIGHT.0, LIGHT.1, at(0));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 6);
        assert_eq!(p.scope_plan.review_mode, ReviewMode::SectionOnly);
        assert_eq!(p.scope_plan.sections_to_review, vec![7]);
        assert!(p.scope_plan.global_checks.is_empty());
        assert_eq!(p.scope_plan.agents_to_invoke, vec!["compliance"]);
        assert!((p.scope_plan.confidence - 1.0).abs() < f64::EPSILON);
    }

    // ── rules ──

    #[test]
    fn light_edit_to_high_risk_section_is_rule_two() {
        let q = DirtyQueue::new().add(3, LIGHT.0, LIGHT.1, at(0));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 2);
        assert_eq!(p.scope_plan.review_mode, ReviewMode::FullDocument);
    }

    #[test]
    fn four_sections_is_cross_section_with_neighbours() {
        let q = DirtyQueue::new()
            .add(1, LIGHT.0, LIGHT.1, at(0))
            .add(2, LIGHT.0, LIGHT.1, at(1))
            .add(5, LIGHT.0, LIGHT.1, at(2))
            .add(6, LIGHT.0, LIGHT.1, at(3));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 3);
        assert_eq!(p.scope_plan.review_mode, ReviewMode::CrossSection);
        assert_eq!(p.scope_plan.related_sections, vec![3, 4, 7]);
        assert_eq!(p.scope_plan.sections_to_review, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(p.scope_plan.agents_to_invoke, vec!["compliance", "evaluation"]);
        assert_eq!(
            p.scope_plan.global_checks,
            vec![GlobalCheck::CrossReferenceConsistency]
        );
    }

    #[test]
    fn two_sections_with_heavy_edit_is_cross_section() {
        let q = DirtyQueue::new()
            .add(5, HEAVY.0, HEAVY.1, at(0))
            .add(6, LIGHT.0, LIGHT.1, at(1));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 4);
        assert_eq!(p.scope_plan.sections_to_review, vec![4, 5, 6, 7]);
        assert_eq!(p.scope_plan.estimated_duration_ms, 5_000 + 4 * 3_000);
    }

    #[test]
    fn two_light_sections_add_disclaimer_check() {
        let q = DirtyQueue::new()
            .add(4, LIGHT.0, LIGHT.1, at(0))
            .add(6, LIGHT.0, LIGHT.1, at(1));
        let p = plan(&q);
        assert_eq!(p.analysis.rule, 5);
        assert_eq!(p.scope_plan.review_mode, ReviewMode::SectionOnly);
        assert_eq!(p.scope_plan.sections_to_review, vec![4, 6]);
        assert_eq!(p.scope_plan.global_checks, vec![GlobalCheck::DisclaimerPresence]);
    }

    #[test]
    fn empty_queue_is_error() {
        let err = plan_review_scope(&DirtyQueue::new(), &doc(), &PlannerConfig::default())
            .unwrap_err();
        assert_matches!(err, ScopeError::EmptyQueue);
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let config = PlannerConfig::default();
        assert!(config.is_high_risk("LIMITATION OF LIABILITY"));
        assert!(config.is_high_risk("Governing Law and Venue"));
        assert!(!config.is_high_risk("Appendix A"));
    }

    #[test]
    fn custom_keywords_are_used() {
        let config = PlannerConfig {
            high_risk_keywords: vec!["fees".into()],
            ..PlannerConfig::default()
        };
        let q = DirtyQueue::new().add(4, LIGHT.0, LIGHT.1, at(0));
        let p = plan_review_scope(&q, &doc(), &config).unwrap();
        assert_eq!(p.scope_plan.review_mode, ReviewMode::FullDocument);
    }

    #[test]
    fn adjacency_uses_sorted_ids_and_skips_dirty() {
        let sections = vec![Section::new(30, "c"), Section::new(10, "a"), Section::new(20, "b")];
        let dirty: BTreeSet<u32> = [10, 20].into_iter().collect();
        let adj = adjacent_sections(&dirty, &sections);
        assert_eq!(adj.into_iter().collect::<Vec<_>>(), vec![30]);
    }

    #[test]
    fn review_mode_round_trips_wire_names() {
        for mode in [
            ReviewMode::SectionOnly,
            ReviewMode::CrossSection,
            ReviewMode::FullDocument,
        ] {
            assert_eq!(mode.as_str().parse::<ReviewMode>().unwrap(), mode);
        }
        assert_matches!(
            "partial".parse::<ReviewMode>(),
            Err(ScopeError::UnknownReviewMode(_))
        );
    }

    #[test]
    fn plan_serializes_camel_case() {
        let q = DirtyQueue::new().add(7, LIGHT.0, LIGHT.1, at(0));
        let v = serde_json::to_value(plan(&q).scope_plan).unwrap();
        assert_eq!(v["reviewMode"], "section-only");
        assert_eq!(v["sectionsToReview"], serde_json::json!([7]));
        assert!(v.get("agentsToInvoke").is_some());
        assert!(v.get("globalChecks").is_some());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_doc() -> impl Strategy<Value = Vec<Section>> {
            proptest::collection::btree_set(0u32..40, 1..12).prop_flat_map(|ids| {
                let ids: Vec<u32> = ids.into_iter().collect();
                let n = ids.len();
                proptest::collection::vec(
                    prop_oneof![
                        Just("Overview"),
                        Just("Fees"),
                        Just("Appendix"),
                        Just("Liability Cap"),
                        Just("Termination"),
                        Just("Definitions"),
                    ],
                    n,
                )
                .prop_map(move |titles| {
                    ids.iter()
                        .zip(titles)
                        .map(|(id, t)| Section::new(*id, t))
                        .collect::<Vec<_>>()
                })
            })
        }

        proptest! {
            #[test]
            fn heavy_high_risk_edit_always_full_document(
                sections in arb_doc(),
                picks in proptest::collection::vec((any::<prop::sample::Index>(), any::<bool>()), 0..8),
            ) {
                let mut q = DirtyQueue::new();
                for (i, (idx, heavy)) in picks.iter().enumerate() {
                    let s = idx.get(&sections);
                    let (b, a) = if *heavy { HEAVY } else { LIGHT };
                    q = q.add(s.id, b, a, at(i as i64));
                }
                let risky = Section::new(1_000, "Risk Factors");
                let mut all = sections.clone();
                all.push(risky.clone());
                q = q.add(risky.id, HEAVY.0, HEAVY.1, at(100));

                let p = plan_review_scope(&q, &all, &PlannerConfig::default()).unwrap();
                prop_assert_eq!(p.scope_plan.review_mode, ReviewMode::FullDocument);
            }

            #[test]
            fn plans_are_valid_subsets_with_full_confidence(
                sections in arb_doc(),
                picks in proptest::collection::vec((any::<prop::sample::Index>(), any::<bool>()), 1..8),
            ) {
                let mut q = DirtyQueue::new();
                for (i, (idx, heavy)) in picks.iter().enumerate() {
                    let s = idx.get(&sections);
                    let (b, a) = if *heavy { HEAVY } else { LIGHT };
                    q = q.add(s.id, b, a, at(i as i64));
                }
                let p = plan_review_scope(&q, &sections, &PlannerConfig::default()).unwrap();
                prop_assert!(crate::validate_scope_plan(&p.scope_plan, &sections).is_ok());
                prop_assert!((p.scope_plan.confidence - 1.0).abs() < f64::EPSILON);
                let ids: BTreeSet<u32> = sections.iter().map(|s| s.id).collect();
                prop_assert!(!p.scope_plan.sections_to_review.is_empty());
                prop_assert!(p.scope_plan.sections_to_review.iter().all(|id| ids.contains(id)));
            }
        }
    }
}
