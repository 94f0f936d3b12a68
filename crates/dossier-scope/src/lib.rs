//! # dossier-scope
//!
//! Decides how much of a document must be re-reviewed after an edit.
//!
//! - [`queue`]: [`DirtyQueue`], a value type of edited sections with magnitudes
//! - [`planner`]: [`plan_review_scope`], six first-match rules over the queue
//! - [`validate`]: [`validate_scope_plan`] and the never-failing
//!   [`plan_review_scope_or_fallback`]
//! - [`boundary`]: `section-<N>` keys and caller-facing JSON shapes
//!
//! Pure and synchronous: no I/O, no async.
//!
//! ## Crate Position
//!
//! Depends on: dossier-core.
//! Depended on by: dossier.

#![deny(unsafe_code)]

pub mod boundary;
pub mod errors;
pub mod planner;
pub mod queue;
pub mod validate;

pub use boundary::{
    ExternalEdit, ExternalScopePlan, ExternalScopeReport, ExternalSection, ReconciledQueue,
    parse_section_key, plan_external, queue_from_edits, reconcile_queue, section_key,
};
pub use errors::ScopeError;
pub use planner::{
    DurationBase, GlobalCheck, PlannerConfig, ReviewMode, ScopeAnalysis, ScopePlan, ScopePlanning,
    Section, plan_review_scope,
};
pub use queue::{DirtyQueue, DirtyQueueEntry, EditMagnitude};
pub use validate::{ScopeOutcome, fallback_plan, plan_review_scope_or_fallback, validate_scope_plan};
