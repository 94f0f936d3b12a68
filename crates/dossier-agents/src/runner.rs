//! Agent runner: lookup → execute → measure → envelope.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use chrono::Utc;
use dossier_core::metrics::AGENT_INVOCATIONS_TOTAL;
use dossier_core::panic::panic_message;
use dossier_core::{ExecutionMode, TraceId};
use futures::FutureExt;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::errors::AgentError;
use crate::registry::AgentRegistry;
use crate::traits::AgentContext;

/// Envelope status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Handler returned an output.
    Success,
    /// Lookup, handler or panic failure.
    Error,
}

impl AgentStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Per-invocation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Wall-clock latency, rounded up to the next millisecond.
    pub latency_ms: u64,
    /// Tokens reported by the handler.
    pub tokens: u64,
    /// Outcome.
    pub status: AgentStatus,
}

/// Uniform result of one agent invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentEnvelope {
    /// Whether the handler produced an output.
    pub ok: bool,
    /// Requested agent id.
    pub agent_id: String,
    /// Trace id of this invocation.
    pub trace_id: TraceId,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Handler output, `null` on error.
    pub output: Value,
    /// Timing and token metadata.
    pub metadata: AgentMetadata,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Convert a `Duration` to milliseconds, rounding up so fast handlers
/// never report `0`.
pub fn duration_ceil_ms(d: Duration) -> u64 {
    d.as_micros().div_ceil(1000) as u64
}

/// Invoke agent `agent_id` once with `input`.
///
/// Never fails: unknown ids, handler errors and handler panics all come back
/// as an error envelope with zero tokens.
#[instrument(skip_all, fields(agent = agent_id, mode = %mode))]
pub async fn run_agent(
    registry: &AgentRegistry,
    agent_id: &str,
    input: Value,
    mode: ExecutionMode,
) -> AgentEnvelope {
    let start = Instant::now();
    let trace_id = TraceId::new();

    let result = match registry.get(agent_id) {
        None => Err(AgentError::UnknownAgent(agent_id.to_owned())),
        Some(handler) => {
            let ctx = AgentContext {
                trace_id: trace_id.clone(),
                mode,
                timestamp: Utc::now(),
                input,
            };
            AssertUnwindSafe(handler.handle(&ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(AgentError::Panicked(panic_message(&*payload))))
        }
    };

    let latency_ms = duration_ceil_ms(start.elapsed());
    let envelope = match result {
        Ok(out) => AgentEnvelope {
            ok: true,
            agent_id: agent_id.to_owned(),
            trace_id,
            mode,
            output: out.output,
            metadata: AgentMetadata {
                latency_ms,
                tokens: out.tokens,
                status: AgentStatus::Success,
            },
            error: None,
        },
        Err(e) => AgentEnvelope {
            ok: false,
            agent_id: agent_id.to_owned(),
            trace_id,
            mode,
            output: Value::Null,
            metadata: AgentMetadata {
                latency_ms,
                tokens: 0,
                status: AgentStatus::Error,
            },
            error: Some(e.to_string()),
        },
    };

    let status = envelope.metadata.status.as_str();
    counter!(AGENT_INVOCATIONS_TOTAL, "agent" => agent_id.to_owned(), "status" => status)
        .increment(1);
    if envelope.ok {
        info!(
            trace_id = %envelope.trace_id,
            status,
            latency_ms,
            tokens = envelope.metadata.tokens,
            "agent invoked"
        );
    } else {
        warn!(
            trace_id = %envelope.trace_id,
            status,
            latency_ms,
            tokens = 0_u64,
            error = envelope.error.as_deref().unwrap_or_default(),
            "agent invoked"
        );
    }
    envelope
}
