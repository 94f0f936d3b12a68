//! Agent error types.

use thiserror::Error;

/// Errors raised by agent lookup or handler execution.
///
/// The runner never lets these escape: every variant is folded into an
/// error [`AgentEnvelope`](crate::runner::AgentEnvelope).
#[derive(Debug, Error)]
pub enum AgentError {
    /// No handler is registered under this id.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// The handler could not deserialize its input.
    #[error("invalid input for {agent}: {message}")]
    InvalidInput {
        /// Agent id.
        agent: String,
        /// Deserialization error.
        message: String,
    },

    /// The handler ran but could not produce an output.
    #[error("{agent} failed: {message}")]
    Handler {
        /// Agent id.
        agent: String,
        /// Failure description.
        message: String,
    },

    /// The model endpoint failed or returned an unusable response.
    #[error("model request failed: {0}")]
    Model(String),

    /// The handler panicked.
    #[error("agent panicked: {0}")]
    Panicked(String),
}

impl AgentError {
    /// Build an [`AgentError::InvalidInput`] from a serde error.
    pub fn invalid_input(agent: &str, err: &serde_json::Error) -> Self {
        Self::InvalidInput {
            agent: agent.to_owned(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_agent_display() {
        assert_eq!(
            AgentError::UnknownAgent("ghost".into()).to_string(),
            "unknown agent: ghost"
        );
    }

    #[test]
    fn invalid_input_from_serde() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let e = AgentError::invalid_input("fact-extractor", &err);
        assert!(e.to_string().starts_with("invalid input for fact-extractor"));
    }
}
