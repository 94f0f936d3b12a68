//! # dossier-skills
//!
//! Reusable skills invoked by review flows, with a choice of transport.
//!
//! - [`catalog`]: skill descriptors (owner agent, output shape, fallback output)
//! - [`transport`]: [`select_transport`] precedence and the [`SkillTransport`] contract
//! - [`local`]: in-process pass-through of precomputed results
//! - [`remote`]: HTTP transport with payload redaction, timeout and fallback
//! - [`audit`]: [`SkillInvocation`] records and sinks
//! - [`dispatcher`]: [`SkillDispatcher::invoke_skill`], the single entry point
//!
//! ## Crate Position
//!
//! Depends on: dossier-core.
//! Depended on by: dossier-runtime, dossier.

#![deny(unsafe_code)]

pub mod audit;
pub mod catalog;
pub mod dispatcher;
pub mod errors;
pub mod local;
pub mod remote;
pub mod transport;

pub use audit::{InvocationSink, MemorySink, SkillInvocation, TracingSink};
pub use catalog::{SkillCatalog, SkillDescriptor};
pub use dispatcher::SkillDispatcher;
pub use errors::SkillError;
pub use transport::{
    SkillCallContext, SkillTransport, TransportConfig, TransportKind, TransportOutcome,
    select_transport,
};
