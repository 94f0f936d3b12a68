//! Scope planning error types.

use thiserror::Error;

/// Errors from planning, validating or converting a review scope.
///
/// None of these reach the review pipeline: [`crate::plan_review_scope_or_fallback`]
/// turns every one into a fallback plan.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Nothing has been edited.
    #[error("dirty queue is empty")]
    EmptyQueue,

    /// The plan selects no sections.
    #[error("plan has no sections to review")]
    NoSections,

    /// The plan references a section the document does not have.
    #[error("plan references unknown section {0}")]
    UnknownSection(u32),

    /// The plan selects no agents.
    #[error("plan invokes no agents")]
    NoAgents,

    /// Review mode string is not one of the known modes.
    #[error("unknown review mode: {0}")]
    UnknownReviewMode(String),

    /// External section key is not of the form `section-<N>`.
    #[error("invalid section key: {0}")]
    InvalidSectionKey(String),

    /// The planner panicked.
    #[error("planner panicked: {0}")]
    Panicked(String),
}

/// Convenience alias for scope results.
pub type Result<T> = std::result::Result<T, ScopeError>;
