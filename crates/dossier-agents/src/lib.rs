//! # dossier-agents
//!
//! Pluggable review agents and the runner that invokes them.
//!
//! - **Contract**: [`AgentHandler`] takes an [`AgentContext`] and returns an [`AgentOutput`]
//! - **Registry**: [`AgentRegistry`] maps agent ids to handlers
//! - **Runner**: [`run_agent`] wraps one invocation with a trace id, timing,
//!   a structured log line and a uniform [`AgentEnvelope`]
//! - **Built-ins**: deterministic compliance, contract and finalization agents in [`builtin`]
//! - **Model**: [`ModelReviewer`], an adversarial reviewer backed by an
//!   OpenAI-compatible endpoint with heuristic fallback
//!
//! ## Crate Position
//!
//! Depends on: dossier-core.
//! Depended on by: dossier-runtime, dossier.

#![deny(unsafe_code)]

pub mod builtin;
pub mod errors;
pub mod model;
pub mod outputs;
pub mod registry;
pub mod runner;
pub mod traits;

pub use errors::AgentError;
pub use model::{ModelConfig, ModelReviewer};
pub use registry::AgentRegistry;
pub use runner::{AgentEnvelope, AgentMetadata, AgentStatus, run_agent};
pub use traits::{AgentContext, AgentHandler, AgentOutput};
