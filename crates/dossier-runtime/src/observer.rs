//! Run lifecycle events and their observers.
//!
//! The engine reports progress to every attached [`RunObserver`]. The
//! execution log in the response does not depend on any observer.

use std::sync::atomic::{AtomicU64, Ordering};

use dossier_core::TraceId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::types::{NextAction, SkipReason, StepPhase};

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// One lifecycle event of an orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Context initialized.
    RunStarted {
        /// Parent trace id.
        trace_id: TraceId,
        /// Flow id.
        flow_id: String,
        /// Document id.
        document_id: String,
    },
    /// A step is about to execute.
    StepStarted {
        /// Parent trace id.
        trace_id: TraceId,
        /// Step id.
        step_id: String,
        /// Phase.
        phase: StepPhase,
    },
    /// A step produced its artifact.
    StepCompleted {
        /// Parent trace id.
        trace_id: TraceId,
        /// Step id.
        step_id: String,
        /// Latency.
        latency_ms: u64,
    },
    /// A step failed.
    StepFailed {
        /// Parent trace id.
        trace_id: TraceId,
        /// Step id.
        step_id: String,
        /// Failure description.
        error: String,
        /// Whether the run aborts.
        critical: bool,
    },
    /// A step was not executed.
    StepSkipped {
        /// Parent trace id.
        trace_id: TraceId,
        /// Step id.
        step_id: String,
        /// Why.
        reason: SkipReason,
    },
    /// The analyzer decided.
    DecisionMade {
        /// Parent trace id.
        trace_id: TraceId,
        /// Decision.
        next_action: NextAction,
        /// Decision confidence.
        confidence: f64,
    },
    /// The run finished, successfully or not.
    RunCompleted {
        /// Parent trace id.
        trace_id: TraceId,
        /// Whether the run succeeded.
        ok: bool,
        /// Total latency.
        latency_ms: u64,
    },
}

impl RunEvent {
    /// Event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::StepSkipped { .. } => "step_skipped",
            Self::DecisionMade { .. } => "decision_made",
            Self::RunCompleted { .. } => "run_completed",
        }
    }

    /// Trace id of the run the event belongs to.
    pub fn trace_id(&self) -> &TraceId {
        match self {
            Self::RunStarted { trace_id, .. }
            | Self::StepStarted { trace_id, .. }
            | Self::StepCompleted { trace_id, .. }
            | Self::StepFailed { trace_id, .. }
            | Self::StepSkipped { trace_id, .. }
            | Self::DecisionMade { trace_id, .. }
            | Self::RunCompleted { trace_id, .. } => trace_id,
        }
    }
}

/// Receives run events. Must not block.
pub trait RunObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &RunEvent);
}

/// Observer that writes every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::StepFailed {
                trace_id,
                step_id,
                error,
                critical,
            } => warn!(trace_id = %trace_id, step = %step_id, critical, error = %error, "step failed"),
            RunEvent::DecisionMade {
                trace_id,
                next_action,
                confidence,
            } => info!(trace_id = %trace_id, next_action = %next_action, confidence, "decision made"),
            RunEvent::RunCompleted {
                trace_id,
                ok,
                latency_ms,
            } => info!(trace_id = %trace_id, ok, latency_ms, "run completed"),
            other => debug!(trace_id = %other.trace_id(), event = other.event_type(), "run event"),
        }
    }
}

/// Broadcast-based event emitter.
///
/// Non-blocking: slow receivers lag and lose events rather than stalling
/// the run.
pub struct RunEventEmitter {
    tx: broadcast::Sender<RunEvent>,
    emit_count: AtomicU64,
}

impl RunEventEmitter {
    /// Emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Send to all subscribers. Returns how many received it.
    pub fn emit(&self, event: RunEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Receiver for every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    /// Active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events emitted so far.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for RunEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunEventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEventEmitter")
            .field("subscribers", &self.subscriber_count())
            .field("emit_count", &self.emit_count())
            .finish()
    }
}

impl RunObserver for RunEventEmitter {
    fn on_event(&self, event: &RunEvent) {
        let _ = self.emit(event.clone());
    }
}
