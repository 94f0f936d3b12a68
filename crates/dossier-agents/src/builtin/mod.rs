//! Built-in deterministic agents.
//!
//! Every handler here is a pure function of its input and behaves the same
//! in `fake` and `real` mode.

pub mod compliance;
pub mod contract;
pub mod finalize;
pub mod review;

use std::sync::Arc;

use crate::traits::AgentHandler;

pub use compliance::{ComplianceEscalation, EvidenceRequester, FactExtractor, PolicyMapper};
pub use contract::{ClauseExtractor, LegalEscalation, NegotiationDrafter};
pub use finalize::{AuditRecorder, ClientCommunicator};
pub use review::AdversarialReviewer;

/// One instance of every built-in handler.
pub fn all() -> Vec<Arc<dyn AgentHandler>> {
    vec![
        Arc::new(FactExtractor),
        Arc::new(PolicyMapper),
        Arc::new(AdversarialReviewer),
        Arc::new(EvidenceRequester),
        Arc::new(ComplianceEscalation),
        Arc::new(ClauseExtractor),
        Arc::new(LegalEscalation),
        Arc::new(NegotiationDrafter),
        Arc::new(ClientCommunicator),
        Arc::new(AuditRecorder),
    ]
}
