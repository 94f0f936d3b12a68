//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs the fields it changes. Each type's
//! [`Default`] carries the production value.

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "skills": { "killSwitch": true },
///   "planner": { "durationPerSectionMs": 2500 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DossierSettings {
    /// Settings schema version.
    pub version: String,
    /// Skill dispatch and transport settings.
    pub skills: SkillSettings,
    /// Review scope planner tuning.
    pub planner: PlannerSettings,
    /// Generative model endpoint used by model-backed agents.
    pub model: ModelSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for DossierSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            skills: SkillSettings::default(),
            planner: PlannerSettings::default(),
            model: ModelSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DossierSettings {
    /// Clamp out-of-range values and repair invariants.
    ///
    /// Called automatically during loading. Bad values are corrected with a
    /// warning rather than rejected.
    pub fn validate(&mut self) {
        fn clamp_ms(val: &mut u64, min: u64, max: u64, name: &str) {
            if *val < min || *val > max {
                let clamped = (*val).clamp(min, max);
                tracing::warn!("{name} out of range ({val}), clamped to {clamped}");
                *val = clamped;
            }
        }

        clamp_ms(
            &mut self.skills.remote_timeout_ms,
            100,
            120_000,
            "skills.remoteTimeoutMs",
        );
        clamp_ms(
            &mut self.model.timeout_ms,
            1_000,
            300_000,
            "model.timeoutMs",
        );

        if self.planner.available_agents.is_empty() {
            tracing::warn!("planner.availableAgents is empty, restoring defaults");
            self.planner.available_agents = PlannerSettings::default().available_agents;
        }
        for keyword in &mut self.planner.high_risk_keywords {
            *keyword = keyword.trim().to_lowercase();
        }
        self.planner.high_risk_keywords.retain(|k| !k.is_empty());

        let trimmed = self.skills.remote_base_url.trim_end_matches('/').to_string();
        self.skills.remote_base_url = trimmed;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Skills
// ─────────────────────────────────────────────────────────────────────────────

/// Skill transport selection and remote safety gating.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillSettings {
    /// Force every skill onto the local transport, ignoring per-call flags.
    pub kill_switch: bool,
    /// Base URL of the remote skill server.
    pub remote_base_url: String,
    /// Remote request timeout in milliseconds.
    pub remote_timeout_ms: u64,
    /// Allow full, unredacted content to reach a loopback skill server.
    pub allow_full_content: bool,
    /// Mark remote requests as test traffic.
    pub test_mode: bool,
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            kill_switch: false,
            remote_base_url: "http://127.0.0.1:8787".to_string(),
            remote_timeout_ms: 10_000,
            allow_full_content: false,
            test_mode: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Planner
// ─────────────────────────────────────────────────────────────────────────────

/// Scope planner tuning.
///
/// Keyword list and duration constants are hand-tuned values, not
/// validated business rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerSettings {
    /// Title keywords (lowercase) that mark a section as high-risk.
    pub high_risk_keywords: Vec<String>,
    /// Every review agent the planner may select, in invocation order.
    pub available_agents: Vec<String>,
    /// Fixed duration component per review mode.
    pub duration_base_ms: DurationBaseSettings,
    /// Duration added per reviewed section.
    pub duration_per_section_ms: u64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            high_risk_keywords: [
                "disclaimer",
                "liability",
                "risk",
                "termination",
                "governing law",
                "warranty",
                "indemnification",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            available_agents: ["compliance", "evaluation", "adversarial"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            duration_base_ms: DurationBaseSettings::default(),
            duration_per_section_ms: 3_000,
        }
    }
}

/// Fixed duration component per review mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DurationBaseSettings {
    /// Section-only reviews.
    pub section_only: u64,
    /// Cross-section reviews.
    pub cross_section: u64,
    /// Full-document reviews.
    pub full_document: u64,
}

impl Default for DurationBaseSettings {
    fn default() -> Self {
        Self {
            section_only: 2_000,
            cross_section: 5_000,
            full_document: 10_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat endpoint used by model-backed agents in `real` mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Base URL (e.g. `http://localhost:11434/v1`). `None` disables model agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model name sent with each request.
    pub model: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 60_000,
            api_key_env: "DOSSIER_MODEL_API_KEY".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = DossierSettings::default();
        assert!(!s.skills.kill_switch);
        assert_eq!(s.skills.remote_timeout_ms, 10_000);
        assert!(!s.skills.allow_full_content);
        assert_eq!(s.planner.high_risk_keywords.len(), 7);
        assert_eq!(
            s.planner.available_agents,
            vec!["compliance", "evaluation", "adversarial"]
        );
        assert_eq!(s.model.timeout_ms, 60_000);
        assert!(s.model.base_url.is_none());
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(DossierSettings::default()).unwrap();
        assert!(json["skills"]["killSwitch"].is_boolean());
        assert!(json["planner"]["durationBaseMs"]["fullDocument"].is_u64());
        assert!(json["model"].get("baseUrl").is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: DossierSettings =
            serde_json::from_str(r#"{"skills": {"killSwitch": true}}"#).unwrap();
        assert!(s.skills.kill_switch);
        assert_eq!(s.skills.remote_timeout_ms, 10_000);
        assert_eq!(s.planner, PlannerSettings::default());
    }

    #[test]
    fn validate_clamps_timeouts() {
        let mut s = DossierSettings::default();
        s.skills.remote_timeout_ms = 5;
        s.model.timeout_ms = 10_000_000;
        s.validate();
        assert_eq!(s.skills.remote_timeout_ms, 100);
        assert_eq!(s.model.timeout_ms, 300_000);
    }

    #[test]
    fn validate_restores_empty_agent_list() {
        let mut s = DossierSettings::default();
        s.planner.available_agents.clear();
        s.validate();
        assert_eq!(s.planner.available_agents.len(), 3);
    }

    #[test]
    fn validate_normalizes_keywords_and_url() {
        let mut s = DossierSettings::default();
        s.planner.high_risk_keywords = vec!["  Liability ".into(), String::new()];
        s.skills.remote_base_url = "http://localhost:9000/".into();
        s.validate();
        assert_eq!(s.planner.high_risk_keywords, vec!["liability"]);
        assert_eq!(s.skills.remote_base_url, "http://localhost:9000");
    }
}
