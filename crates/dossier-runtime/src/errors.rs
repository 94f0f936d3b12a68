//! Runtime error types.

use thiserror::Error;

/// Errors raised while building flows or running an orchestration.
///
/// [`crate::ReviewOrchestrator::orchestrate`] never returns these directly:
/// they become the `error` field of a failure response.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No flow is registered under this id.
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Two steps of one flow write the same artifact key.
    #[error("flow {flow}: artifact key '{key}' is written by more than one step")]
    DuplicateArtifactKey {
        /// Flow id.
        flow: String,
        /// Artifact key.
        key: String,
    },

    /// Two steps of one flow share an id.
    #[error("flow {flow}: duplicate step id '{step}'")]
    DuplicateStepId {
        /// Flow id.
        flow: String,
        /// Step id.
        step: String,
    },

    /// A critical step failed and the run was aborted.
    #[error("critical step '{step}' failed: {message}")]
    CriticalStep {
        /// Step id.
        step: String,
        /// Failure description.
        message: String,
    },

    /// Something panicked outside a step.
    #[error("orchestration panicked: {0}")]
    Panicked(String),
}
