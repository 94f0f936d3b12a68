//! Skill dispatcher: lookup → select transport → execute → audit.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dossier_core::InvocationId;
use dossier_core::metrics::{SKILL_FALLBACKS_TOTAL, SKILL_INVOCATIONS_TOTAL};
use dossier_core::summary::{DEFAULT_SUMMARY_BYTES, redact, summarize};
use metrics::counter;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::audit::{InvocationSink, SkillInvocation};
use crate::catalog::SkillCatalog;
use crate::errors::SkillError;
use crate::local::{LocalTransport, PRECOMPUTED_FIELD};
use crate::remote::RemoteTransport;
use crate::transport::{
    SkillCallContext, SkillTransport, TransportConfig, TransportKind, TransportOutcome,
    select_transport,
};

/// Routes skill calls to a transport and keeps the audit trail.
#[derive(Clone)]
pub struct SkillDispatcher {
    catalog: Arc<SkillCatalog>,
    config: TransportConfig,
    local: Arc<dyn SkillTransport>,
    remote: Arc<dyn SkillTransport>,
    sink: Option<Arc<dyn InvocationSink>>,
}

impl SkillDispatcher {
    /// Dispatcher with the built-in local and HTTP transports.
    pub fn new(catalog: Arc<SkillCatalog>, config: TransportConfig) -> Self {
        let remote = Arc::new(RemoteTransport::new(config.clone()));
        Self {
            catalog,
            config,
            local: Arc::new(LocalTransport),
            remote,
            sink: None,
        }
    }

    /// Attach an invocation sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn InvocationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the remote transport.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn SkillTransport>) -> Self {
        self.remote = remote;
        self
    }

    /// The skill catalog.
    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    /// Transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Invoke skill `name`.
    ///
    /// Unknown names and local failures are errors. Remote failures are not:
    /// the skill's fallback output is returned and the failure is recorded in
    /// the audit trail. An audit record is written for every call that reaches
    /// a transport.
    #[instrument(skip_all, fields(skill = name, correlation_id = %ctx.correlation_id))]
    pub async fn invoke_skill(
        &self,
        name: &str,
        input: &Value,
        ctx: &SkillCallContext,
    ) -> Result<Value, SkillError> {
        let descriptor = self
            .catalog
            .get(name)
            .ok_or_else(|| SkillError::UnknownSkill(name.to_owned()))?;

        let kind = select_transport(&self.config, ctx.remote);
        let transport = match kind {
            TransportKind::Local => &self.local,
            TransportKind::Remote => &self.remote,
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let result = transport.execute(descriptor, input, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let ended_at = Utc::now();

        let (ok, output_summary, target, error) = match &result {
            Ok(TransportOutcome { output, meta }) => (
                meta.ok,
                summarize(output, DEFAULT_SUMMARY_BYTES),
                meta.target.clone(),
                meta.error.clone(),
            ),
            Err(e) => (false, String::new(), kind.as_str().to_owned(), Some(e.to_string())),
        };

        let mut input_for_summary = input.clone();
        if let Some(obj) = input_for_summary.as_object_mut() {
            let _ = obj.remove(PRECOMPUTED_FIELD);
        }
        let invocation = SkillInvocation {
            invocation_id: InvocationId::new(),
            skill_name: descriptor.name.to_owned(),
            agent: descriptor.owner_agent.to_owned(),
            started_at,
            ended_at,
            duration_ms,
            ok,
            input_summary: summarize(&redact(&input_for_summary), DEFAULT_SUMMARY_BYTES),
            output_summary,
            correlation_id: ctx.correlation_id.clone(),
            transport: kind,
            target,
            error,
        };

        counter!(
            SKILL_INVOCATIONS_TOTAL,
            "skill" => descriptor.name,
            "transport" => kind.as_str(),
            "ok" => if ok { "true" } else { "false" }
        )
        .increment(1);
        if ok {
            info!(transport = %kind, duration_ms, "skill invoked");
        } else {
            if kind == TransportKind::Remote && result.is_ok() {
                counter!(SKILL_FALLBACKS_TOTAL, "skill" => descriptor.name).increment(1);
            }
            warn!(
                transport = %kind,
                duration_ms,
                error = invocation.error.as_deref().unwrap_or_default(),
                "skill invocation failed"
            );
        }

        if let Some(sink) = &self.sink {
            sink.record(invocation);
        }

        result.map(|outcome| outcome.output)
    }
}

impl std::fmt::Debug for SkillDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillDispatcher")
            .field("skills", &self.catalog.names())
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use assert_matches::assert_matches;
    use dossier_core::CorrelationId;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(config: TransportConfig) -> (SkillDispatcher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let d = SkillDispatcher::new(Arc::new(SkillCatalog::builtin()), config)
            .with_sink(sink.clone());
        (d, sink)
    }

    fn unreachable_url() -> String {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        format!("http://127.0.0.1:{port}")
    }

    fn input() -> Value {
        json!({"content": "Beneficial Owner: Jane Doe", "precomputed": {"topics": ["ownership"]}})
    }

    #[tokio::test]
    async fn unknown_skill_is_error_without_audit() {
        let (d, sink) = dispatcher(TransportConfig::default());
        let err = d
            .invoke_skill("summon-demon", &input(), &SkillCallContext::local())
            .await
            .unwrap_err();
        assert_matches!(err, SkillError::UnknownSkill(_));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn local_call_returns_precomputed_and_audits() {
        let (d, sink) = dispatcher(TransportConfig::default());
        let out = d
            .invoke_skill("extract-topics", &input(), &SkillCallContext::local())
            .await
            .unwrap();
        assert_eq!(out, json!({"topics": ["ownership"]}));

        let records = sink.snapshot();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert!(rec.ok);
        assert_eq!(rec.transport, TransportKind::Local);
        assert_eq!(rec.agent, "compliance");
        assert!(!rec.input_summary.contains("Jane"));
        assert!(rec.output_summary.contains("ownership"));
    }

    #[tokio::test]
    async fn local_failure_is_error_and_audited() {
        let (d, sink) = dispatcher(TransportConfig::default());
        let err = d
            .invoke_skill("score-risk", &json!({"content": "x"}), &SkillCallContext::local())
            .await
            .unwrap_err();
        assert_matches!(err, SkillError::LocalExecution { .. });
        let rec = &sink.snapshot()[0];
        assert!(!rec.ok);
        assert!(rec.error.is_some());
    }

    #[tokio::test]
    async fn unreachable_remote_returns_fallback_with_failed_audit() {
        let config = TransportConfig {
            remote_base_url: unreachable_url(),
            ..TransportConfig::default()
        };
        let (d, sink) = dispatcher(config);
        let ctx = SkillCallContext::remote(CorrelationId::new());
        let out = d.invoke_skill("extract-topics", &input(), &ctx).await.unwrap();
        assert_eq!(out, json!({"topics": []}));

        let rec = &sink.snapshot()[0];
        assert!(!rec.ok);
        assert_eq!(rec.transport, TransportKind::Remote);
        assert_eq!(rec.correlation_id, ctx.correlation_id);
        assert!(rec.error.is_some());
    }

    #[tokio::test]
    async fn kill_switch_keeps_remote_requests_local() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = TransportConfig {
            kill_switch: true,
            remote_base_url: server.uri(),
            ..TransportConfig::default()
        };
        let (d, sink) = dispatcher(config);
        let ctx = SkillCallContext::remote(CorrelationId::new());
        let out = d.invoke_skill("extract-topics", &input(), &ctx).await.unwrap();
        assert_eq!(out["topics"][0], "ownership");
        assert_eq!(sink.snapshot()[0].transport, TransportKind::Local);
    }

    #[tokio::test]
    async fn remote_success_is_audited_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "skill_name": "score-risk",
                "output_summary": {"score": 42, "reason": "two risky clauses"},
                "duration_ms": 3
            })))
            .mount(&server)
            .await;

        let config = TransportConfig {
            remote_base_url: server.uri(),
            ..TransportConfig::default()
        };
        let (d, sink) = dispatcher(config);
        let out = d
            .invoke_skill("score-risk", &input(), &SkillCallContext::remote(CorrelationId::new()))
            .await
            .unwrap();
        assert_eq!(out["score"], 42);
        let rec = &sink.snapshot()[0];
        assert!(rec.ok);
        assert_eq!(rec.agent, "evaluation");
        assert!(rec.target.ends_with("/risk-scorer"));
    }
}
