//! Skill catalog: name → descriptor.

use std::collections::HashMap;

use serde_json::{Value, json};

/// JSON type a required output field must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// JSON array.
    Array,
    /// JSON number.
    Number,
    /// JSON string.
    String,
    /// JSON boolean.
    Bool,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Bool => "boolean",
        }
    }
}

/// Required top-level fields of a skill's output object.
#[derive(Clone, Copy, Debug)]
pub struct OutputShape(pub &'static [(&'static str, FieldType)]);

impl OutputShape {
    /// Check `output` is an object carrying every required field with the right type.
    pub fn validate(&self, output: &Value) -> Result<(), String> {
        let Some(obj) = output.as_object() else {
            return Err("output is not an object".into());
        };
        for (field, ty) in self.0 {
            match obj.get(*field) {
                None => return Err(format!("missing field '{field}'")),
                Some(v) if !ty.matches(v) => {
                    return Err(format!("field '{field}' is not a {}", ty.as_str()));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Static description of one skill.
#[derive(Clone, Debug)]
pub struct SkillDescriptor {
    /// Skill name, e.g. `score-risk`.
    pub name: &'static str,
    /// Agent that owns the skill, recorded in audit entries.
    pub owner_agent: &'static str,
    /// Execution target label on the remote side.
    pub target: &'static str,
    /// Required output fields.
    pub output_shape: OutputShape,
    /// Safe output used when the remote transport fails. Receives the failure reason.
    pub fallback: fn(&str) -> Value,
}

impl SkillDescriptor {
    /// Fallback output for a failure described by `reason`.
    pub fn fallback_output(&self, reason: &str) -> Value {
        (self.fallback)(reason)
    }
}

/// Marker prefix on fallback reasons, so consumers can tell degraded outputs apart.
pub const DEGRADED_PREFIX: &str = "[degraded]";

fn topics_fallback(_reason: &str) -> Value {
    json!({ "topics": [] })
}

fn risk_fallback(reason: &str) -> Value {
    json!({ "score": 0, "reason": format!("{DEGRADED_PREFIX} {reason}") })
}

fn disclaimer_fallback(reason: &str) -> Value {
    json!({ "present": false, "reason": format!("{DEGRADED_PREFIX} {reason}") })
}

/// Descriptor for `extract-topics`.
pub const EXTRACT_TOPICS: SkillDescriptor = SkillDescriptor {
    name: "extract-topics",
    owner_agent: "compliance",
    target: "topic-extractor",
    output_shape: OutputShape(&[("topics", FieldType::Array)]),
    fallback: topics_fallback,
};

/// Descriptor for `score-risk`.
pub const SCORE_RISK: SkillDescriptor = SkillDescriptor {
    name: "score-risk",
    owner_agent: "evaluation",
    target: "risk-scorer",
    output_shape: OutputShape(&[("score", FieldType::Number), ("reason", FieldType::String)]),
    fallback: risk_fallback,
};

/// Descriptor for `check-disclaimer`.
pub const CHECK_DISCLAIMER: SkillDescriptor = SkillDescriptor {
    name: "check-disclaimer",
    owner_agent: "compliance",
    target: "disclaimer-checker",
    output_shape: OutputShape(&[("present", FieldType::Bool), ("reason", FieldType::String)]),
    fallback: disclaimer_fallback,
};

/// Lookup table of skill descriptors.
#[derive(Clone, Debug, Default)]
pub struct SkillCatalog {
    skills: HashMap<&'static str, SkillDescriptor>,
}

impl SkillCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with `extract-topics`, `score-risk` and `check-disclaimer`.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for descriptor in [EXTRACT_TOPICS, SCORE_RISK, CHECK_DISCLAIMER] {
            catalog.register(descriptor);
        }
        catalog
    }

    /// Register a descriptor, replacing any with the same name.
    pub fn register(&mut self, descriptor: SkillDescriptor) {
        let _ = self.skills.insert(descriptor.name, descriptor);
    }

    /// Look up a descriptor.
    pub fn get(&self, name: &str) -> Option<&SkillDescriptor> {
        self.skills.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.skills.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_names() {
        assert_eq!(
            SkillCatalog::builtin().names(),
            vec!["check-disclaimer", "extract-topics", "score-risk"]
        );
    }

    #[test]
    fn fallbacks_match_their_shapes() {
        for d in [EXTRACT_TOPICS, SCORE_RISK, CHECK_DISCLAIMER] {
            let out = d.fallback_output("timeout");
            assert!(d.output_shape.validate(&out).is_ok(), "{} fallback invalid", d.name);
        }
    }

    #[test]
    fn fallback_values() {
        assert_eq!(EXTRACT_TOPICS.fallback_output("x"), json!({"topics": []}));
        let risk = SCORE_RISK.fallback_output("unreachable");
        assert_eq!(risk["score"], 0);
        assert_eq!(risk["reason"], "[degraded] unreachable");
        assert_eq!(CHECK_DISCLAIMER.fallback_output("x")["present"], false);
    }

    #[test]
    fn shape_rejects_wrong_types() {
        let shape = SCORE_RISK.output_shape;
        assert!(shape.validate(&json!({"score": "high", "reason": "r"})).is_err());
        assert!(shape.validate(&json!({"score": 10})).is_err());
        assert!(shape.validate(&json!([1])).is_err());
        assert!(shape.validate(&json!({"score": 10, "reason": "r", "extra": 1})).is_ok());
    }
}
