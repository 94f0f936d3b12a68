//! Model-backed adversarial reviewer.
//!
//! Calls an OpenAI-compatible `/chat/completions` endpoint and expects a JSON
//! object `{"findings": [...]}` back. Any failure (timeout, transport error,
//! non-2xx, unparseable reply) degrades to the heuristic reviewer with
//! `degraded = true`. In `fake` mode the endpoint is never contacted.

use std::time::Duration;

use async_trait::async_trait;
use dossier_core::ExecutionMode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::builtin::review::{AdversarialReviewer, ReviewInput, heuristic_report};
use crate::errors::AgentError;
use crate::outputs::{Finding, FindingsReport};
use crate::traits::{AgentContext, AgentHandler, AgentOutput};

/// Default request timeout.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_INSTRUCTION: &str = "You review KYC and contract text for risk. \
Reply with a JSON object {\"findings\": [{\"code\", \"severity\", \"message\", \"excerpt\"}]} \
where severity is one of low, medium, high, critical.";

/// Endpoint configuration for [`ModelReviewer`].
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Bearer token, if the endpoint needs one.
    pub api_key: Option<String>,
}

impl ModelConfig {
    /// Config with the default timeout and no API key.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: DEFAULT_MODEL_TIMEOUT,
            api_key: None,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ModelFindings {
    findings: Vec<Finding>,
}

/// `adversarial-reviewer` backed by a generative model.
pub struct ModelReviewer {
    config: ModelConfig,
    client: reqwest::Client,
}

impl ModelReviewer {
    /// Create a reviewer with its own HTTP client.
    pub fn new(config: ModelConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a reviewer with a shared HTTP client.
    pub fn with_client(config: ModelConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> Result<HeaderMap, AgentError> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| AgentError::Model(format!("invalid API key header: {e}")))?;
            let _ = headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn build_body(&self, input: &ReviewInput) -> Value {
        let user = match &input.title {
            Some(title) => format!("Section: {title}\n\n{}", input.content),
            None => input.content.clone(),
        };
        json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_INSTRUCTION},
                {"role": "user", "content": user},
            ],
        })
    }

    /// One request, no retries.
    async fn request_findings(&self, input: &ReviewInput) -> Result<(Vec<Finding>, u64), AgentError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let headers = self.build_headers()?;
        debug!(model = %self.config.model, %url, "sending model review request");

        let exchange = async {
            let response = self
                .client
                .post(&url)
                .headers(headers)
                .json(&self.build_body(input))
                .send()
                .await
                .map_err(|e| AgentError::Model(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(AgentError::Model(format!("HTTP {}", status.as_u16())));
            }
            let chat = response
                .json::<ChatResponse>()
                .await
                .map_err(|e| AgentError::Model(format!("invalid response body: {e}")))?;
            Ok::<_, AgentError>(chat)
        };
        let chat = tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| AgentError::Model(format!("timed out after {:?}", self.config.timeout)))??;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::Model("response has no content".into()))?;
        let parsed: ModelFindings = serde_json::from_str(&content)
            .map_err(|e| AgentError::Model(format!("reply is not findings JSON: {e}")))?;
        Ok((parsed.findings, chat.usage.map_or(0, |u| u.total_tokens)))
    }
}

#[async_trait]
impl AgentHandler for ModelReviewer {
    fn id(&self) -> &str {
        AdversarialReviewer::ID
    }

    #[instrument(skip_all, fields(agent = AdversarialReviewer::ID, model = %self.config.model))]
    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: ReviewInput = ctx.parse_input(AdversarialReviewer::ID)?;

        if ctx.mode == ExecutionMode::Fake {
            return AgentOutput::from_payload(
                AdversarialReviewer::ID,
                &ctx.input,
                &heuristic_report(&input.content),
            );
        }

        match self.request_findings(&input).await {
            Ok((findings, tokens)) => {
                let report = FindingsReport {
                    findings,
                    source: "model".into(),
                    degraded: false,
                };
                let mut out = AgentOutput::from_payload(AdversarialReviewer::ID, &ctx.input, &report)?;
                if tokens > 0 {
                    out.tokens = tokens;
                }
                Ok(out)
            }
            Err(e) => {
                warn!(error = %e, "model review failed, using heuristic reviewer");
                let mut report = heuristic_report(&input.content);
                report.degraded = true;
                AgentOutput::from_payload(AdversarialReviewer::ID, &ctx.input, &report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use dossier_core::TraceId;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx(mode: ExecutionMode) -> AgentContext {
        AgentContext {
            trace_id: TraceId::new(),
            mode,
            timestamp: Utc::now(),
            input: json!({"content": "Funds routed through an offshore shell company.", "title": "Ownership"}),
        }
    }

    fn reviewer(base_url: &str) -> ModelReviewer {
        let mut config = ModelConfig::new(base_url, "test-model");
        config.timeout = Duration::from_millis(500);
        config.api_key = Some("sk-test".into());
        ModelReviewer::new(config)
    }

    fn report(out: AgentOutput) -> FindingsReport {
        serde_json::from_value(out.output).unwrap()
    }

    #[tokio::test]
    async fn real_mode_uses_model_findings() {
        let server = MockServer::start().await;
        let reply = json!({"findings": [{"code": "opaque_ownership", "severity": "high", "message": "Ownership chain unclear"}]});
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply.to_string()}}],
                "usage": {"total_tokens": 321}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = reviewer(&server.uri()).handle(&ctx(ExecutionMode::Real)).await.unwrap();
        assert_eq!(out.tokens, 321);
        let r = report(out);
        assert_eq!(r.source, "model");
        assert!(!r.degraded);
        assert_eq!(r.findings[0].code, "opaque_ownership");
    }

    #[tokio::test]
    async fn server_error_degrades_to_heuristic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let r = report(reviewer(&server.uri()).handle(&ctx(ExecutionMode::Real)).await.unwrap());
        assert!(r.degraded);
        assert_eq!(r.source, "heuristic");
        assert!(r.findings.iter().any(|f| f.code == "shell_company"));
    }

    #[tokio::test]
    async fn slow_model_times_out_and_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let r = report(reviewer(&server.uri()).handle(&ctx(ExecutionMode::Real)).await.unwrap());
        assert!(r.degraded);
    }

    /// Server that sends headers and part of the body, then stalls.
    async fn stalled_body_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _ = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"choices\":",
                )
                .await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn stalled_body_times_out_and_degrades() {
        let base = stalled_body_server().await;
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            reviewer(&base).handle(&ctx(ExecutionMode::Real)),
        )
        .await
        .expect("model call must not outlive its timeout")
        .unwrap();
        let r = report(out);
        assert!(r.degraded);
        assert_eq!(r.source, "heuristic");
    }

    #[tokio::test]
    async fn stalled_body_reports_timeout() {
        let base = stalled_body_server().await;
        let input = ReviewInput {
            content: "text".into(),
            title: None,
        };
        let err = tokio::time::timeout(Duration::from_secs(5), reviewer(&base).request_findings(&input))
            .await
            .expect("model call must not outlive its timeout")
            .unwrap_err();
        assert_matches!(err, AgentError::Model(msg) if msg.starts_with("timed out"));
    }

    #[tokio::test]
    async fn garbage_reply_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "I think it is fine"}}]
            })))
            .mount(&server)
            .await;

        let r = report(reviewer(&server.uri()).handle(&ctx(ExecutionMode::Real)).await.unwrap());
        assert!(r.degraded);
    }

    #[tokio::test]
    async fn fake_mode_never_calls_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let r = report(reviewer(&server.uri()).handle(&ctx(ExecutionMode::Fake)).await.unwrap());
        assert!(!r.degraded);
        assert_eq!(r.source, "heuristic");
    }

    #[test]
    fn body_includes_title_and_model() {
        let input = ReviewInput {
            content: "text".into(),
            title: Some("Risk".into()),
        };
        let body = reviewer("http://localhost").build_body(&input);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][1]["content"], "Section: Risk\n\ntext");
    }

    #[test]
    fn headers_without_key_have_no_auth() {
        let r = ModelReviewer::new(ModelConfig::new("http://localhost", "m"));
        let headers = r.build_headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
    }
}
