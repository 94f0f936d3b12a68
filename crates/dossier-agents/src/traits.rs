//! The agent handler contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dossier_core::{ExecutionMode, TraceId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AgentError;

/// Invocation context handed to a handler.
#[derive(Clone, Debug)]
pub struct AgentContext {
    /// Trace id of this invocation.
    pub trace_id: TraceId,
    /// Fake or real execution.
    pub mode: ExecutionMode,
    /// When the invocation started.
    pub timestamp: DateTime<Utc>,
    /// Handler input.
    pub input: Value,
}

impl AgentContext {
    /// Deserialize the input into the handler's typed input struct.
    pub fn parse_input<T: DeserializeOwned>(&self, agent: &str) -> Result<T, AgentError> {
        T::deserialize(&self.input).map_err(|e| AgentError::invalid_input(agent, &e))
    }
}

/// What a handler returns on success.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentOutput {
    /// Structured output.
    pub output: Value,
    /// Tokens consumed (estimated for deterministic handlers).
    pub tokens: u64,
}

impl AgentOutput {
    /// Serialize `payload` and estimate its token cost against `input`.
    pub fn from_payload<T: Serialize>(
        agent: &str,
        input: &Value,
        payload: &T,
    ) -> Result<Self, AgentError> {
        let output = serde_json::to_value(payload).map_err(|e| AgentError::Handler {
            agent: agent.to_owned(),
            message: e.to_string(),
        })?;
        let tokens = estimate_tokens(input) + estimate_tokens(&output);
        Ok(Self { output, tokens })
    }
}

/// A pluggable processing unit.
///
/// Handlers are invoked exactly once per call; the runner adds tracing,
/// timing and the envelope.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Registry id, e.g. `fact-extractor`.
    fn id(&self) -> &str;

    /// Run the agent.
    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError>;
}

/// Rough token estimate: four bytes of compact JSON per token, rounded up.
pub fn estimate_tokens(value: &Value) -> u64 {
    let len = match value {
        Value::Null => 0,
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    };
    len.div_ceil(4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Input {
        content: String,
    }

    fn ctx(input: Value) -> AgentContext {
        AgentContext {
            trace_id: TraceId::new(),
            mode: ExecutionMode::Fake,
            timestamp: Utc::now(),
            input,
        }
    }

    #[test]
    fn parse_input_ok() {
        let parsed: Input = ctx(json!({"content": "abc"})).parse_input("t").unwrap();
        assert_eq!(parsed.content, "abc");
    }

    #[test]
    fn parse_input_reports_agent() {
        let err = ctx(json!({})).parse_input::<Input>("fact-extractor").unwrap_err();
        assert_matches!(err, AgentError::InvalidInput { ref agent, .. } if agent == "fact-extractor");
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(&Value::Null), 0);
        assert_eq!(estimate_tokens(&json!("abcde")), 2);
        assert_eq!(estimate_tokens(&json!({"a": 1})), 2);
    }
}
