//! Heuristic adversarial reviewer: red-flag phrase scan.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::errors::AgentError;
use crate::outputs::{Finding, FindingsReport, Severity};
use crate::traits::{AgentContext, AgentHandler, AgentOutput};

struct RedFlag {
    code: &'static str,
    pattern: &'static str,
    severity: Severity,
    message: &'static str,
}

const RED_FLAGS: &[RedFlag] = &[
    RedFlag {
        code: "sanctions_exposure",
        pattern: r"sanction(?:s|ed)?|embargo(?:ed)?",
        severity: Severity::Critical,
        message: "References sanctions or embargoed parties",
    },
    RedFlag {
        code: "unlimited_liability",
        pattern: r"unlimited liability|uncapped liability|liability (?:is|shall be) uncapped",
        severity: Severity::Critical,
        message: "Liability is unlimited",
    },
    RedFlag {
        code: "shell_company",
        pattern: r"shell (?:company|companies|entity|entities)",
        severity: Severity::High,
        message: "Possible shell company structure",
    },
    RedFlag {
        code: "nominee_arrangement",
        pattern: r"nominee (?:director|shareholder|owner)s?",
        severity: Severity::High,
        message: "Nominee directors or shareholders",
    },
    RedFlag {
        code: "pep_exposure",
        pattern: r"politically exposed|pep",
        severity: Severity::High,
        message: "Politically exposed person involved",
    },
    RedFlag {
        code: "cash_intensive",
        pattern: r"cash[- ](?:only|intensive)|large cash",
        severity: Severity::High,
        message: "Cash-intensive activity",
    },
    RedFlag {
        code: "unilateral_termination",
        pattern: r"terminate at any time|without (?:prior )?notice",
        severity: Severity::High,
        message: "Counterparty may terminate unilaterally",
    },
    RedFlag {
        code: "offshore_structure",
        pattern: r"offshore",
        severity: Severity::Medium,
        message: "Offshore structure",
    },
    RedFlag {
        code: "layered_ownership",
        pattern: r"layered ownership|multiple layers|complex ownership",
        severity: Severity::Medium,
        message: "Layered or opaque ownership",
    },
    RedFlag {
        code: "auto_renewal",
        pattern: r"auto(?:matic(?:ally)?)?[- ]renew(?:s|al|ed)?",
        severity: Severity::Medium,
        message: "Automatic renewal",
    },
    RedFlag {
        code: "guaranteed_returns",
        pattern: r"guaranteed (?:returns?|profits?)",
        severity: Severity::Medium,
        message: "Guaranteed returns promised",
    },
    RedFlag {
        code: "vague_terms",
        pattern: r"to be determined|tbd|as appropriate",
        severity: Severity::Low,
        message: "Vague or unfinished wording",
    },
];

static COMPILED: LazyLock<Vec<(&'static RedFlag, Regex)>> = LazyLock::new(|| {
    RED_FLAGS
        .iter()
        .map(|flag| {
            let re = Regex::new(&format!(r"(?i)\b(?:{})\b", flag.pattern)).unwrap();
            (flag, re)
        })
        .collect()
});

/// Scan `content` for red-flag phrases; one finding per flag, in table order.
pub fn heuristic_findings(content: &str) -> Vec<Finding> {
    COMPILED
        .iter()
        .filter_map(|(flag, re)| {
            re.find(content).map(|m| Finding {
                code: flag.code.to_owned(),
                severity: flag.severity,
                message: flag.message.to_owned(),
                excerpt: Some(m.as_str().to_owned()),
            })
        })
        .collect()
}

/// Heuristic report for `content`.
pub fn heuristic_report(content: &str) -> FindingsReport {
    FindingsReport {
        findings: heuristic_findings(content),
        source: "heuristic".into(),
        degraded: false,
    }
}

#[derive(Deserialize)]
pub(crate) struct ReviewInput {
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) title: Option<String>,
}

/// `adversarial-reviewer` agent, heuristic variant.
pub struct AdversarialReviewer;

impl AdversarialReviewer {
    /// Registry id.
    pub const ID: &'static str = "adversarial-reviewer";
}

#[async_trait]
impl AgentHandler for AdversarialReviewer {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn handle(&self, ctx: &AgentContext) -> Result<AgentOutput, AgentError> {
        let input: ReviewInput = ctx.parse_input(Self::ID)?;
        AgentOutput::from_payload(Self::ID, &ctx.input, &heuristic_report(&input.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_has_no_findings() {
        assert!(heuristic_findings("Standard onboarding of a retail bakery.").is_empty());
    }

    #[test]
    fn detects_flags_case_insensitively() {
        let findings = heuristic_findings("Owned via an OFFSHORE Shell Company with nominee directors.");
        let codes: Vec<&str> = findings.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["shell_company", "nominee_arrangement", "offshore_structure"]);
        assert_eq!(findings[0].excerpt.as_deref(), Some("Shell Company"));
    }

    #[test]
    fn word_boundaries_prevent_false_positives() {
        assert!(heuristic_findings("pepper supplier in the peppermint trade").is_empty());
    }

    #[test]
    fn one_finding_per_flag() {
        let findings = heuristic_findings("sanctioned entity; embargoed goods; sanctions list");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(COMPILED.len(), RED_FLAGS.len());
    }

    #[test]
    fn report_marks_source() {
        let r = heuristic_report("auto-renews yearly");
        assert_eq!(r.source, "heuristic");
        assert!(!r.degraded);
        assert_eq!(r.findings[0].code, "auto_renewal");
    }
}
