//! Finalization agents: client communication draft and audit record.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AgentError;
use crate::outputs::{AuditRecord, ClientDraft};
use crate::traits::{AgentContext, AgentHandler, AgentOutput};

// ─────────────────────────────────────────────────────────────────────────────
// client-communicator
// ─────────────────────────────────────────────────────────────────────────────

fn default_language() -> String {
    "en".into()
}

fn default_tone() -> String {
    "formal".into()
}

#[derive(Deserialize)]
struct DraftInput {
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_tone")]
    tone: String,
    #[serde(default)]
    client_name: Option<String>,
    next_action: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    recommended_actions: Vec<String>,
}

struct Phrasebook {
    code: &'static str,
    formal_greeting: &'static str,
    friendly_greeting: &'static str,
    formal_closing: &'static str,
    friendly_closing: &'static str,
}

const PHRASEBOOKS: &[Phrasebook] = &[
    Phrasebook {
        code: "en",
        formal_greeting: "Dear",
        friendly_greeting: "Hi",
        formal_closing: "Kind regards,\nThe Review Team",
        friendly_closing: "Thanks,\nThe Review Team",
    },
    Phrasebook {
        code: "es",
        formal_greeting: "Estimado/a",
        friendly_greeting: "Hola",
        formal_closing: "Atentamente,\nEl equipo de revisión",
        friendly_closing: "Gracias,\nEl equipo de revisión",
    },
    Phrasebook {
        code: "fr",
        formal_greeting: "Madame, Monsieur",
        friendly_greeting: "Bonjour",
        formal_closing: "Cordialement,\nL'équipe de revue",
        friendly_closing: "Merci,\nL'équipe de revue",
    },
    Phrasebook {
        code: "de",
        formal_greeting: "Sehr geehrte/r",
        friendly_greeting: "Hallo",
        formal_closing: "Mit freundlichen Grüßen,\nIhr Prüfungsteam",
        friendly_closing: "Danke,\nIhr Prüfungsteam",
    },
];

fn status_line(next_action: &str) -> (&'static str, &'static str) {
    match next_action {
        "ready_to_send" => ("Review complete", "Your submission passed our review and no further information is needed."),
        "request_more_info" => ("Additional information needed", "We need a few more documents before we can complete the review."),
        "rejected" => ("Review outcome", "We are unable to proceed with the submission in its current form."),
        "ready_to_sign" => ("Contract ready to sign", "The contract terms are acceptable and ready for signature."),
        "acceptable_risk" => ("Contract reviewed", "The contract is acceptable with minor points noted below."),
        "negotiate_terms" => ("Proposed contract changes", "We would like to discuss changes to several terms before signing."),
        "escalate_legal" => ("Contract under legal review", "The contract has been referred to our legal team for further review."),
        _ => ("Review update", "Your review has been updated."),
    }
}

fn draft_message(input: &DraftInput) -> ClientDraft {
    let language = input.language.trim().to_lowercase();
    let book = PHRASEBOOKS
        .iter()
        .find(|b| b.code == language)
        .unwrap_or(&PHRASEBOOKS[0]);
    let friendly = input.tone.eq_ignore_ascii_case("friendly");
    let (greeting, closing) = if friendly {
        (book.friendly_greeting, book.friendly_closing)
    } else {
        (book.formal_greeting, book.formal_closing)
    };
    let (subject, status) = status_line(&input.next_action);
    let name = input.client_name.as_deref().unwrap_or("Client");

    let mut body = format!("{greeting} {name},\n\n{status}\n");
    if !input.reason.is_empty() {
        body.push_str(&format!("\nSummary: {}\n", input.reason));
    }
    if !input.recommended_actions.is_empty() {
        body.push_str("\nNext steps:\n");
        for action in &input.recommended_actions {
            body.push_str(&format!("- {action}\n"));
        }
    }
    body.push('\n');
    body.push_str(closing);

    ClientDraft {
        language: book.code.to_owned(),
        tone: if friendly { "friendly" } else { "formal" }.to_owned(),
        subject: subject.to_owned(),
        body,
    }
}

/// `client-communicator` agent.
pub struct ClientCommunicator;

impl ClientCommunicator {
    /// Registry id.
    pub const ID: &'static str = "client-communicator";
}

#[async_trait]
impl AgentHandler for ClientCommunicator {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: DraftInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &draft_message(&input))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// audit-recorder
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AuditInput {
    document_id: String,
    flow_id: String,
    next_action: String,
    #[serde(default)]
    reviewer_name: Option<String>,
    #[serde(default)]
    steps: Vec<String>,
    #[serde(default)]
    artifact_keys: Vec<String>,
}

/// 64-bit FNV-1a, hex encoded. Stable across runs and platforms.
fn fnv1a_hex(parts: &[&str]) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hash ^= u64::from(b'|');
            hash = hash.wrapping_mul(PRIME);
        }
        for byte in part.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    format!("{hash:016x}")
}

fn build_audit_record(input: AuditInput) -> AuditRecord {
    let steps = input.steps.join(",");
    let keys = input.artifact_keys.join(",");
    let digest = fnv1a_hex(&[
        input.document_id.as_str(),
        input.flow_id.as_str(),
        input.next_action.as_str(),
        input.reviewer_name.as_deref().unwrap_or_default(),
        steps.as_str(),
        keys.as_str(),
    ]);
    AuditRecord {
        document_id: input.document_id,
        flow_id: input.flow_id,
        next_action: input.next_action,
        reviewer: input.reviewer_name,
        steps: input.steps,
        artifact_keys: input.artifact_keys,
        digest,
    }
}

/// `audit-recorder` agent.
pub struct AuditRecorder;

impl AuditRecorder {
    /// Registry id.
    pub const ID: &'static str = "audit-recorder";
}

#[async_trait]
impl AgentHandler for AuditRecorder {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: AuditInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &build_audit_record(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(input: serde_json::Value) -> ClientDraft {
        draft_message(&serde_json::from_value(input).unwrap())
    }

    // ── client-communicator ──────────────────────────────────────────────

    #[test]
    fn formal_english_by_default() {
        let d = draft(json!({"client_name": "Northwind", "next_action": "request_more_info"}));
        assert_eq!(d.language, "en");
        assert_eq!(d.tone, "formal");
        assert_eq!(d.subject, "Additional information needed");
        assert!(d.body.starts_with("Dear Northwind,"));
        assert!(d.body.ends_with("The Review Team"));
    }

    #[test]
    fn friendly_spanish_with_next_steps() {
        let d = draft(json!({
            "language": "ES",
            "tone": "friendly",
            "next_action": "negotiate_terms",
            "recommended_actions": ["Review clause-3"]
        }));
        assert_eq!(d.language, "es");
        assert!(d.body.starts_with("Hola Client,"));
        assert!(d.body.contains("- Review clause-3"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let d = draft(json!({"language": "xx", "next_action": "ready_to_sign"}));
        assert_eq!(d.language, "en");
        assert_eq!(d.subject, "Contract ready to sign");
    }

    // ── audit-recorder ───────────────────────────────────────────────────

    fn audit_input() -> AuditInput {
        serde_json::from_value(json!({
            "document_id": "doc-1",
            "flow_id": "compliance-review-v1",
            "next_action": "ready_to_send",
            "reviewer_name": "R. Analyst",
            "steps": ["extract_facts", "map_policies"],
            "artifact_keys": ["facts", "policy_mappings"]
        }))
        .unwrap()
    }

    #[test]
    fn audit_digest_is_stable() {
        let a = build_audit_record(audit_input());
        let b = build_audit_record(audit_input());
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 16);
        assert_eq!(a.reviewer.as_deref(), Some("R. Analyst"));
    }

    #[test]
    fn audit_digest_changes_with_decision() {
        let a = build_audit_record(audit_input());
        let mut other = audit_input();
        other.next_action = "rejected".into();
        assert_ne!(a.digest, build_audit_record(other).digest);
    }

    #[test]
    fn fnv_separates_parts() {
        assert_ne!(fnv1a_hex(&["ab", "c"]), fnv1a_hex(&["a", "bc"]));
    }
}
