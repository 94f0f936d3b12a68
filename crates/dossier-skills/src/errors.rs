//! Skill error types.

use thiserror::Error;

/// Errors surfaced by the skill dispatcher.
///
/// Remote transport failures never appear here: they are replaced by the
/// skill's fallback output and recorded only in the invocation audit trail.
#[derive(Debug, Error)]
pub enum SkillError {
    /// No skill is registered under this name.
    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    /// The in-process transport could not produce a valid output.
    #[error("local execution of {skill} failed: {message}")]
    LocalExecution {
        /// Skill name.
        skill: String,
        /// Failure description.
        message: String,
    },

    /// Transport configuration is unusable (e.g. malformed base URL).
    #[error("invalid skill transport config: {0}")]
    InvalidConfig(String),
}
