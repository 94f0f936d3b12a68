//! Transport selection and the shared transport contract.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dossier_core::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::catalog::SkillDescriptor;
use crate::errors::SkillError;

/// Default remote skill server.
pub const DEFAULT_REMOTE_BASE_URL: &str = "http://127.0.0.1:8787";

/// Default remote request timeout.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a skill runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process.
    Local,
    /// HTTP skill server.
    Remote,
}

impl TransportKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport configuration, fixed at dispatcher construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Force every call onto the local transport.
    pub kill_switch: bool,
    /// Remote skill server base URL.
    pub remote_base_url: String,
    /// Remote request timeout.
    pub timeout: Duration,
    /// Permit unredacted content, only honoured for loopback targets.
    pub allow_full_content: bool,
    /// Mark remote requests as test traffic.
    pub test_mode: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kill_switch: false,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_owned(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            allow_full_content: false,
            test_mode: false,
        }
    }
}

/// Pick a transport for one call.
///
/// Precedence: kill switch → local; per-call opt-in → remote; otherwise local.
pub fn select_transport(config: &TransportConfig, per_call_remote: bool) -> TransportKind {
    if config.kill_switch {
        TransportKind::Local
    } else if per_call_remote {
        TransportKind::Remote
    } else {
        TransportKind::Local
    }
}

/// Per-call context supplied by the caller.
#[derive(Clone, Debug)]
pub struct SkillCallContext {
    /// Correlates this call with the caller's run.
    pub correlation_id: CorrelationId,
    /// Opt into the remote transport for this call.
    pub remote: bool,
    /// Cancels an in-flight remote request.
    pub cancel: CancellationToken,
}

impl SkillCallContext {
    /// Local-only context with a fresh correlation id.
    pub fn local() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            remote: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Context that opts into the remote transport.
    pub fn remote(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            remote: true,
            cancel: CancellationToken::new(),
        }
    }
}

/// Transport-level details of one call.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationMeta {
    /// Transport used.
    pub transport: TransportKind,
    /// Execution target (`in-process` or `<base_url>/<target>`).
    pub target: String,
    /// Whether the skill itself succeeded (false when a fallback was used).
    pub ok: bool,
    /// Failure reason when `ok` is false.
    pub error: Option<String>,
    /// Whether the input was reduced to metadata before leaving the process.
    pub redacted: bool,
    /// Metadata returned by the remote server.
    pub server_meta: Option<Value>,
}

/// Output plus meta, identical shape for both transports.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportOutcome {
    /// Skill output (possibly a fallback).
    pub output: Value,
    /// Call details.
    pub meta: InvocationMeta,
}

/// A way of executing skills.
#[async_trait]
pub trait SkillTransport: Send + Sync {
    /// Which transport this is.
    fn kind(&self) -> TransportKind;

    /// Execute `skill` with `input`.
    async fn execute(
        &self,
        skill: &SkillDescriptor,
        input: &Value,
        ctx: &SkillCallContext,
    ) -> Result<TransportOutcome, SkillError>;
}
