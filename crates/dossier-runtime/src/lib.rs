//! # dossier-runtime
//!
//! Review flows and the engine that runs them.
//!
//! - **Flows**: [`FlowDefinition`] (main, conditional, finalization steps plus a
//!   [`DecisionAnalyzer`]) in a [`FlowRegistry`]; built-ins are
//!   `compliance-review-v1` and `contract-risk-review-v1`
//! - **Context**: [`OrchestrationContext`], advanced by folding [`StepDelta`]s
//! - **Artifacts**: typed step outputs ([`Artifact`])
//! - **Engine**: [`ReviewOrchestrator::orchestrate`], request in, response out, never `Err`
//! - **Observers**: [`RunObserver`] with [`TracingObserver`] and the broadcast [`RunEventEmitter`]
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: dossier-core, dossier-agents, dossier-skills.
//! Depended on by: dossier.

#![deny(unsafe_code)]

pub mod artifacts;
pub mod context;
pub mod engine;
pub mod errors;
pub mod flows;
pub mod observer;
pub mod types;

pub use artifacts::{Artifact, ArtifactKind, DisclaimerCheck, RiskScore, Topics};
pub use context::{AnalyzerVerdict, OrchestrationContext, StepDelta};
pub use engine::ReviewOrchestrator;
pub use errors::RuntimeError;
pub use flows::{DecisionAnalyzer, FlowDefinition, FlowRegistry, PlanStep, StepTarget};
pub use observer::{RunEvent, RunEventEmitter, RunObserver, TracingObserver};
pub use types::{
    Decision, ExecutionLog, InputSection, NextAction, OrchestrationRequest,
    OrchestrationResponse, PlanEntry, PlanStatus, ReviewOptions, Signals, SkipReason,
    StepExecutionResult, StepPhase, StepStatus,
};
