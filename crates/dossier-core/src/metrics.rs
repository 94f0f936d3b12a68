//! Metric name constants shared across crates.
//!
//! Recording goes through the `metrics` facade in each crate; installing an
//! exporter is left to the embedding application.

/// Orchestration runs total (counter, labels: flow, outcome).
pub const ORCHESTRATION_RUNS_TOTAL: &str = "orchestration_runs_total";
/// Orchestration run duration seconds (histogram, labels: flow).
pub const ORCHESTRATION_RUN_DURATION_SECONDS: &str = "orchestration_run_duration_seconds";
/// Step duration seconds (histogram, labels: step, status).
pub const ORCHESTRATION_STEP_DURATION_SECONDS: &str = "orchestration_step_duration_seconds";
/// Agent invocations total (counter, labels: agent, status).
pub const AGENT_INVOCATIONS_TOTAL: &str = "agent_invocations_total";
/// Skill invocations total (counter, labels: skill, transport, ok).
pub const SKILL_INVOCATIONS_TOTAL: &str = "skill_invocations_total";
/// Remote skill fallbacks total (counter, labels: skill).
pub const SKILL_FALLBACKS_TOTAL: &str = "skill_fallbacks_total";
/// Scope plans produced (counter, labels: mode, fallback).
pub const SCOPE_PLANS_TOTAL: &str = "scope_plans_total";
