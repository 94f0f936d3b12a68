//! Skill invocation audit trail.

use chrono::{DateTime, Utc};
use dossier_core::{CorrelationId, InvocationId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::transport::TransportKind;

/// One skill call. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillInvocation {
    /// Unique id of this record.
    pub invocation_id: InvocationId,
    /// Skill name.
    pub skill_name: String,
    /// Agent that owns the skill.
    pub agent: String,
    /// Call start.
    pub started_at: DateTime<Utc>,
    /// Call end.
    pub ended_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Whether the skill produced a real (non-fallback) output.
    pub ok: bool,
    /// Metadata-only input summary.
    pub input_summary: String,
    /// Truncated output summary.
    pub output_summary: String,
    /// Caller's correlation id.
    pub correlation_id: CorrelationId,
    /// Transport used.
    pub transport: TransportKind,
    /// Execution target.
    pub target: String,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only receiver for invocation records.
pub trait InvocationSink: Send + Sync {
    /// Record one invocation.
    fn record(&self, invocation: SkillInvocation);
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SkillInvocation>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record, in arrival order.
    pub fn snapshot(&self) -> Vec<SkillInvocation> {
        self.records.lock().clone()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl InvocationSink for MemorySink {
    fn record(&self, invocation: SkillInvocation) {
        self.records.lock().push(invocation);
    }
}

/// Sink that writes each record as a structured `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl InvocationSink for TracingSink {
    fn record(&self, inv: SkillInvocation) {
        tracing::info!(
            invocation_id = %inv.invocation_id,
            skill = %inv.skill_name,
            agent = %inv.agent,
            transport = %inv.transport,
            target = %inv.target,
            ok = inv.ok,
            duration_ms = inv.duration_ms,
            correlation_id = %inv.correlation_id,
            error = inv.error.as_deref().unwrap_or_default(),
            "skill invocation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ok: bool) -> SkillInvocation {
        let now = Utc::now();
        SkillInvocation {
            invocation_id: InvocationId::new(),
            skill_name: "extract-topics".into(),
            agent: "compliance".into(),
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            ok,
            input_summary: "{}".into(),
            output_summary: "{}".into(),
            correlation_id: CorrelationId::new(),
            transport: TransportKind::Local,
            target: "in-process".into(),
            error: None,
        }
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.record(record(true));
        sink.record(record(false));
        let snap = sink.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap[0].ok);
        assert!(!snap[1].ok);
    }

    #[test]
    fn tracing_sink_accepts_records() {
        TracingSink.record(record(true));
    }

    #[test]
    fn invocation_serializes_transport_lowercase() {
        let v = serde_json::to_value(record(true)).unwrap();
        assert_eq!(v["transport"], "local");
        assert!(v.get("error").is_none());
    }
}
