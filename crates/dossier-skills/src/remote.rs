//! HTTP transport to an out-of-process skill server.
//!
//! `POST {base_url}/skills/execute` with a [`RemoteSkillRequest`]. The input
//! is reduced to metadata unless the server is on a loopback address and full
//! content is explicitly allowed. Every failure (timeout, cancellation,
//! connection error, non-2xx, schema mismatch, `ok = false`) yields the
//! skill's fallback output instead of an error.

use std::net::IpAddr;

use async_trait::async_trait;
use dossier_core::summary::redact;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::catalog::SkillDescriptor;
use crate::errors::SkillError;
use crate::local::PRECOMPUTED_FIELD;
use crate::transport::{
    InvocationMeta, SkillCallContext, SkillTransport, TransportConfig, TransportKind,
    TransportOutcome,
};

/// Request body sent to the skill server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSkillRequest {
    /// Skill to execute.
    pub skill_name: String,
    /// Skill input, metadata-only unless full content is permitted.
    pub input_summary: Value,
    /// Caller's correlation id.
    pub correlation_id: String,
    /// Marks test traffic.
    pub test_mode: bool,
}

/// Response body expected from the skill server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteSkillResponse {
    /// Whether the skill succeeded.
    pub ok: bool,
    /// Echo of the requested skill.
    pub skill_name: String,
    /// Skill output.
    pub output_summary: Value,
    /// Server-side duration.
    pub duration_ms: u64,
    /// Server-side error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form server metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Whether `base_url` points at a loopback host.
///
/// Unparseable URLs are treated as non-loopback.
pub fn is_loopback(base_url: &str) -> bool {
    let Ok(url) = Url::parse(base_url) else {
        return false;
    };
    match url.host() {
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

/// Build the outgoing payload for `input`.
///
/// The locally precomputed result is never sent. Returns the payload and
/// whether it was redacted.
pub fn build_payload(input: &Value, config: &TransportConfig) -> (Value, bool) {
    let mut stripped = input.clone();
    if let Some(obj) = stripped.as_object_mut() {
        let _ = obj.remove(PRECOMPUTED_FIELD);
    }
    if config.allow_full_content && is_loopback(&config.remote_base_url) {
        (stripped, false)
    } else {
        (redact(&stripped), true)
    }
}

/// HTTP skill transport.
#[derive(Clone, Debug)]
pub struct RemoteTransport {
    config: TransportConfig,
    client: reqwest::Client,
}

impl RemoteTransport {
    /// Transport with its own HTTP client.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Transport with a shared HTTP client.
    pub fn with_client(config: TransportConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> Result<Url, SkillError> {
        let raw = format!(
            "{}/skills/execute",
            self.config.remote_base_url.trim_end_matches('/')
        );
        Url::parse(&raw).map_err(|e| SkillError::InvalidConfig(format!("{raw}: {e}")))
    }

    async fn call(
        &self,
        skill: &SkillDescriptor,
        request: &RemoteSkillRequest,
        ctx: &SkillCallContext,
    ) -> Result<RemoteSkillResponse, String> {
        let url = self.endpoint().map_err(|e| e.to_string())?;
        let exchange = async {
            let response = self
                .client
                .post(url)
                .json(request)
                .send()
                .await
                .map_err(|e| format!("request failed: {e}"))?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("HTTP {}", status.as_u16()));
            }
            let body = response
                .json::<RemoteSkillResponse>()
                .await
                .map_err(|e| format!("schema mismatch: {e}"))?;
            Ok::<_, String>(body)
        };

        // Deadline covers the body read as well as the headers.
        let body = tokio::select! {
            () = ctx.cancel.cancelled() => return Err("cancelled".into()),
            res = tokio::time::timeout(self.config.timeout, exchange) => match res {
                Err(_) => return Err(format!("timed out after {}ms", self.config.timeout.as_millis())),
                Ok(result) => result?,
            },
        };
        if body.skill_name != skill.name {
            return Err(format!(
                "schema mismatch: response for '{}' to a '{}' request",
                body.skill_name, skill.name
            ));
        }
        if !body.ok {
            return Err(body
                .error
                .clone()
                .unwrap_or_else(|| "server reported failure".into()));
        }
        skill
            .output_shape
            .validate(&body.output_summary)
            .map_err(|e| format!("schema mismatch: {e}"))?;
        Ok(body)
    }
}

#[async_trait]
impl SkillTransport for RemoteTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    async fn execute(
        &self,
        skill: &SkillDescriptor,
        input: &Value,
        ctx: &SkillCallContext,
    ) -> Result<TransportOutcome, SkillError> {
        let (input_summary, redacted) = build_payload(input, &self.config);
        let request = RemoteSkillRequest {
            skill_name: skill.name.to_owned(),
            input_summary,
            correlation_id: ctx.correlation_id.to_string(),
            test_mode: self.config.test_mode,
        };
        let target = format!(
            "{}/{}",
            self.config.remote_base_url.trim_end_matches('/'),
            skill.target
        );
        debug!(skill = skill.name, %target, redacted, "dispatching remote skill");

        let outcome = match self.call(skill, &request, ctx).await {
            Ok(body) => TransportOutcome {
                output: body.output_summary,
                meta: InvocationMeta {
                    transport: TransportKind::Remote,
                    target,
                    ok: true,
                    error: None,
                    redacted,
                    server_meta: body.meta,
                },
            },
            Err(reason) => {
                warn!(skill = skill.name, %reason, "remote skill failed, using fallback output");
                TransportOutcome {
                    output: skill.fallback_output(&reason),
                    meta: InvocationMeta {
                        transport: TransportKind::Remote,
                        target,
                        ok: false,
                        error: Some(reason),
                        redacted,
                        server_meta: None,
                    },
                }
            }
        };
        Ok(outcome)
    }
}
