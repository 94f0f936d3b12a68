//! In-process transport.
//!
//! Skills have no local implementation yet: the caller supplies the result
//! under `precomputed` and this transport hands it back after checking it
//! against the skill's output shape. Failures are returned as errors.

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::SkillDescriptor;
use crate::errors::SkillError;
use crate::transport::{
    InvocationMeta, SkillCallContext, SkillTransport, TransportKind, TransportOutcome,
};

/// Field of the skill input that carries the locally computed result.
pub const PRECOMPUTED_FIELD: &str = "precomputed";

/// Pass-through transport.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalTransport;

#[async_trait]
impl SkillTransport for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    async fn execute(
        &self,
        skill: &SkillDescriptor,
        input: &Value,
        _ctx: &SkillCallContext,
    ) -> Result<TransportOutcome, SkillError> {
        let output = input
            .get(PRECOMPUTED_FIELD)
            .cloned()
            .ok_or_else(|| SkillError::LocalExecution {
                skill: skill.name.to_owned(),
                message: format!("input has no '{PRECOMPUTED_FIELD}' field"),
            })?;
        skill
            .output_shape
            .validate(&output)
            .map_err(|message| SkillError::LocalExecution {
                skill: skill.name.to_owned(),
                message,
            })?;
        Ok(TransportOutcome {
            output,
            meta: InvocationMeta {
                transport: TransportKind::Local,
                target: "in-process".to_owned(),
                ok: true,
                error: None,
                redacted: false,
                server_meta: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EXTRACT_TOPICS, SCORE_RISK};
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn passes_precomputed_through() {
        let input = json!({"content": "x", "precomputed": {"topics": ["kyc"]}});
        let out = LocalTransport
            .execute(&EXTRACT_TOPICS, &input, &SkillCallContext::local())
            .await
            .unwrap();
        assert_eq!(out.output, json!({"topics": ["kyc"]}));
        assert!(out.meta.ok);
        assert_eq!(out.meta.transport, TransportKind::Local);
    }

    #[tokio::test]
    async fn missing_precomputed_is_error() {
        let err = LocalTransport
            .execute(&EXTRACT_TOPICS, &json!({"content": "x"}), &SkillCallContext::local())
            .await
            .unwrap_err();
        assert_matches!(err, SkillError::LocalExecution { .. });
    }

    #[tokio::test]
    async fn wrong_shape_is_error() {
        let input = json!({"precomputed": {"score": "high"}});
        let err = LocalTransport
            .execute(&SCORE_RISK, &input, &SkillCallContext::local())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("score"));
    }
}
