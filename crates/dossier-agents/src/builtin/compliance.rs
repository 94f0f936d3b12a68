//! KYC/AML agents: fact extraction, policy mapping, evidence requests and
//! compliance escalation.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::errors::AgentError;
use crate::outputs::{
    EscalationMemo, EvidenceItem, EvidenceRequest, FactSheet, Finding, PolicyMapping,
    PolicyMappings, PolicyStatus, Severity,
};
use crate::traits::{AgentContext, AgentHandler, AgentOutput};

/// Facts every KYC section must state, in report order.
pub const REQUIRED_FACTS: [&str; 5] = [
    "legal_name",
    "registration_number",
    "beneficial_owner",
    "source_of_funds",
    "jurisdiction",
];

const SANCTIONED_JURISDICTIONS: [&str; 6] = [
    "north korea",
    "dprk",
    "iran",
    "syria",
    "cuba",
    "crimea",
];

static FACT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*]?\s*([A-Za-z][A-Za-z ()]{1,40}?)\s*:\s*(\S.*?)\s*$").unwrap());

static REGISTRATION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]{4,}$").unwrap());

#[derive(Deserialize)]
struct ContentInput {
    content: String,
}

/// Map a free-text label onto a canonical fact name.
fn canonical_fact(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();
    let fact = match label.as_str() {
        "legal name" | "company name" | "entity name" | "client name" => "legal_name",
        "registration number" | "registration no" | "company number" | "registration" => {
            "registration_number"
        }
        "beneficial owner" | "ultimate beneficial owner" | "ubo" | "beneficial owner(s)" => {
            "beneficial_owner"
        }
        "source of funds" | "funds source" | "source of wealth" => "source_of_funds",
        "jurisdiction" | "country of incorporation" | "country" => "jurisdiction",
        _ => return None,
    };
    Some(fact)
}

// ─────────────────────────────────────────────────────────────────────────────
// fact-extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Pull `Label: value` facts out of section text.
///
/// The first occurrence of each fact wins.
pub fn extract_facts(content: &str) -> FactSheet {
    let mut sheet = FactSheet::default();
    for caps in FACT_LINE.captures_iter(content) {
        let Some(fact) = canonical_fact(&caps[1]) else {
            continue;
        };
        let _ = sheet
            .facts
            .entry(fact.to_owned())
            .or_insert_with(|| caps[2].to_owned());
    }
    sheet.missing = REQUIRED_FACTS
        .iter()
        .filter(|f| !sheet.facts.contains_key(**f))
        .map(ToString::to_string)
        .collect();
    sheet
}

/// `fact-extractor` agent.
pub struct FactExtractor;

impl FactExtractor {
    /// Registry id.
    pub const ID: &'static str = "fact-extractor";
}

#[async_trait]
impl AgentHandler for FactExtractor {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: ContentInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &extract_facts(&input.content))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// policy-mapper
// ─────────────────────────────────────────────────────────────────────────────

fn mapping(
    policy_id: &str,
    fact: &str,
    status: PolicyStatus,
    severity: Severity,
    note: impl Into<String>,
) -> PolicyMapping {
    PolicyMapping {
        policy_id: policy_id.to_owned(),
        fact: fact.to_owned(),
        status,
        severity,
        note: note.into(),
    }
}

/// Evaluate the KYC/AML rule set against `sheet`.
pub fn map_policies(sheet: &FactSheet) -> PolicyMappings {
    let fact = |name: &str| sheet.facts.get(name).map(|v| v.trim());
    let mut mappings = Vec::with_capacity(5);

    mappings.push(match fact("legal_name") {
        Some(_) => mapping("KYC-001", "legal_name", PolicyStatus::Satisfied, Severity::Medium, "legal name provided"),
        None => mapping("KYC-001", "legal_name", PolicyStatus::Unclear, Severity::Medium, "legal name not stated"),
    });

    mappings.push(match fact("registration_number") {
        Some(n) if REGISTRATION_NUMBER.is_match(&n.to_uppercase()) => mapping(
            "KYC-002",
            "registration_number",
            PolicyStatus::Satisfied,
            Severity::Medium,
            "registration number well-formed",
        ),
        Some(n) => mapping(
            "KYC-002",
            "registration_number",
            PolicyStatus::Unclear,
            Severity::Medium,
            format!("registration number '{n}' is malformed"),
        ),
        None => mapping(
            "KYC-002",
            "registration_number",
            PolicyStatus::Unclear,
            Severity::Medium,
            "registration number not stated",
        ),
    });

    mappings.push(match fact("beneficial_owner") {
        Some(owner) if is_undisclosed(owner) => mapping(
            "KYC-003",
            "beneficial_owner",
            PolicyStatus::Violated,
            Severity::High,
            "beneficial owner withheld",
        ),
        Some(_) => mapping(
            "KYC-003",
            "beneficial_owner",
            PolicyStatus::Satisfied,
            Severity::High,
            "beneficial owner identified",
        ),
        None => mapping(
            "KYC-003",
            "beneficial_owner",
            PolicyStatus::Violated,
            Severity::High,
            "beneficial owner not identified",
        ),
    });

    mappings.push(match fact("source_of_funds") {
        Some(src) if is_undisclosed(src) => mapping(
            "AML-001",
            "source_of_funds",
            PolicyStatus::Violated,
            Severity::High,
            "source of funds withheld",
        ),
        Some(src) if src.to_lowercase().contains("cash") => mapping(
            "AML-001",
            "source_of_funds",
            PolicyStatus::Unclear,
            Severity::Medium,
            "cash source of funds needs supporting evidence",
        ),
        Some(_) => mapping(
            "AML-001",
            "source_of_funds",
            PolicyStatus::Satisfied,
            Severity::High,
            "source of funds documented",
        ),
        None => mapping(
            "AML-001",
            "source_of_funds",
            PolicyStatus::Unclear,
            Severity::High,
            "source of funds not stated",
        ),
    });

    mappings.push(match fact("jurisdiction") {
        Some(j) if is_sanctioned(j) => mapping(
            "SAN-001",
            "jurisdiction",
            PolicyStatus::Violated,
            Severity::Critical,
            format!("jurisdiction '{j}' is under sanctions"),
        ),
        Some(_) => mapping(
            "SAN-001",
            "jurisdiction",
            PolicyStatus::Satisfied,
            Severity::Critical,
            "jurisdiction not sanctioned",
        ),
        None => mapping(
            "SAN-001",
            "jurisdiction",
            PolicyStatus::Unclear,
            Severity::High,
            "jurisdiction not stated",
        ),
    });

    PolicyMappings { mappings }
}

fn is_undisclosed(value: &str) -> bool {
    let v = value.to_lowercase();
    ["undisclosed", "unknown", "withheld", "n/a", "none"]
        .iter()
        .any(|w| v == *w || v.starts_with(&format!("{w} ")))
}

fn is_sanctioned(jurisdiction: &str) -> bool {
    let j = jurisdiction.to_lowercase();
    SANCTIONED_JURISDICTIONS.iter().any(|s| j.contains(s))
}

#[derive(Deserialize)]
struct PolicyInput {
    facts: FactSheet,
}

/// `policy-mapper` agent.
pub struct PolicyMapper;

impl PolicyMapper {
    /// Registry id.
    pub const ID: &'static str = "policy-mapper";
}

#[async_trait]
impl AgentHandler for PolicyMapper {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: PolicyInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &map_policies(&input.facts))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// evidence-requester
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EvidenceInput {
    #[serde(default)]
    missing_facts: Vec<String>,
    #[serde(default)]
    unclear_policies: Vec<PolicyMapping>,
    #[serde(default)]
    findings: Vec<Finding>,
}

fn document_for(fact: &str) -> &'static str {
    match fact {
        "legal_name" => "Certificate of incorporation",
        "registration_number" => "Company registry extract",
        "beneficial_owner" => "Beneficial ownership declaration",
        "source_of_funds" => "Bank statements evidencing source of funds",
        "jurisdiction" => "Proof of registered address",
        _ => "Supporting documentation",
    }
}

fn build_evidence_request(input: &EvidenceInput) -> EvidenceRequest {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();
    let mut push = |topic: String, reason: String| {
        if seen.insert(topic.clone()) {
            items.push(EvidenceItem { topic, reason });
        }
    };

    for fact in &input.missing_facts {
        push(document_for(fact).to_owned(), format!("{fact} was not provided"));
    }
    for policy in &input.unclear_policies {
        push(document_for(&policy.fact).to_owned(), format!("{}: {}", policy.policy_id, policy.note));
    }
    let urgent = input.findings.iter().any(|f| f.severity >= Severity::High);
    for finding in input.findings.iter().filter(|f| f.severity >= Severity::High) {
        push(format!("Written explanation of {}", finding.code), finding.message.clone());
    }

    EvidenceRequest {
        items,
        due_in_days: if urgent { 7 } else { 14 },
    }
}

/// `evidence-requester` agent.
pub struct EvidenceRequester;

impl EvidenceRequester {
    /// Registry id.
    pub const ID: &'static str = "evidence-requester";
}

#[async_trait]
impl AgentHandler for EvidenceRequester {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: EvidenceInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &build_evidence_request(&input))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// compliance-escalation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EscalationInput {
    reason: String,
    #[serde(default)]
    blocking_issues: Vec<String>,
    #[serde(default)]
    violations: Vec<PolicyMapping>,
    #[serde(default)]
    findings: Vec<Finding>,
}

fn build_compliance_memo(input: &EscalationInput) -> EscalationMemo {
    let priority = input
        .violations
        .iter()
        .map(|v| v.severity)
        .chain(input.findings.iter().map(|f| f.severity))
        .max()
        .unwrap_or(Severity::High)
        .max(Severity::High);

    let mut issues: Vec<String> = Vec::new();
    let candidates = input
        .blocking_issues
        .iter()
        .cloned()
        .chain(input.violations.iter().map(|v| format!("{}: {}", v.policy_id, v.note)))
        .chain(
            input
                .findings
                .iter()
                .filter(|f| f.severity >= Severity::High)
                .map(|f| format!("{} ({})", f.message, f.severity)),
        );
    for issue in candidates {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }

    EscalationMemo {
        audience: "compliance".into(),
        priority,
        summary: format!("Compliance escalation: {}", input.reason),
        issues,
    }
}

/// `compliance-escalation` agent.
pub struct ComplianceEscalation;

impl ComplianceEscalation {
    /// Registry id.
    pub const ID: &'static str = "compliance-escalation";
}

#[async_trait]
impl AgentHandler for ComplianceEscalation {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: EscalationInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &build_compliance_memo(&input))
    }
}
