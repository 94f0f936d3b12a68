//! Settings loading: compiled defaults, JSON file deep-merge, env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::DossierSettings;

/// Default settings location: `~/.dossier/settings.json`.
///
/// Falls back to the current directory when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".dossier").join("settings.json")
}

/// Load settings from [`settings_path`] with env overrides applied.
pub fn load_settings() -> Result<DossierSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`.
///
/// A missing file yields compiled defaults (plus env overrides). A file that
/// exists but fails to parse is an error.
pub fn load_settings_from_path(path: &Path) -> Result<DossierSettings> {
    let defaults = serde_json::to_value(DossierSettings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&raw)?;
        debug!(?path, "merging user settings file");
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: DossierSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value (including arrays)
/// replaces the base value. `null` in the overlay keeps the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `DOSSIER_*` environment variable overrides from the process env.
pub fn apply_env_overrides(settings: &mut DossierSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply `DOSSIER_*` overrides using `lookup` as the variable source.
///
/// | Variable | Field |
/// |---|---|
/// | `DOSSIER_SKILLS_KILL_SWITCH` | `skills.killSwitch` |
/// | `DOSSIER_SKILLS_REMOTE_URL` | `skills.remoteBaseUrl` |
/// | `DOSSIER_SKILLS_TIMEOUT_MS` | `skills.remoteTimeoutMs` |
/// | `DOSSIER_SKILLS_ALLOW_FULL_CONTENT` | `skills.allowFullContent` |
/// | `DOSSIER_SKILLS_TEST_MODE` | `skills.testMode` |
/// | `DOSSIER_MODEL_URL` | `model.baseUrl` |
/// | `DOSSIER_MODEL_NAME` | `model.model` |
/// | `DOSSIER_MODEL_TIMEOUT_MS` | `model.timeoutMs` |
/// | `DOSSIER_LOG_LEVEL` | `logging.level` |
/// | `DOSSIER_LOG_JSON` | `logging.json` |
///
/// Unparseable values are ignored with a warning.
pub fn apply_overrides_from(settings: &mut DossierSettings, lookup: impl Fn(&str) -> Option<String>) {
    let flag = |key: &str, target: &mut bool| {
        if let Some(raw) = lookup(key) {
            match parse_bool(&raw) {
                Some(v) => *target = v,
                None => warn!(key, value = %raw, "ignoring non-boolean override"),
            }
        }
    };
    let millis = |key: &str, target: &mut u64| {
        if let Some(raw) = lookup(key) {
            match raw.trim().parse::<u64>() {
                Ok(v) => *target = v,
                Err(_) => warn!(key, value = %raw, "ignoring non-numeric override"),
            }
        }
    };
    let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    flag("DOSSIER_SKILLS_KILL_SWITCH", &mut settings.skills.kill_switch);
    if let Some(url) = text("DOSSIER_SKILLS_REMOTE_URL") {
        settings.skills.remote_base_url = url;
    }
    millis("DOSSIER_SKILLS_TIMEOUT_MS", &mut settings.skills.remote_timeout_ms);
    flag(
        "DOSSIER_SKILLS_ALLOW_FULL_CONTENT",
        &mut settings.skills.allow_full_content,
    );
    flag("DOSSIER_SKILLS_TEST_MODE", &mut settings.skills.test_mode);

    if let Some(url) = text("DOSSIER_MODEL_URL") {
        settings.model.base_url = Some(url);
    }
    if let Some(name) = text("DOSSIER_MODEL_NAME") {
        settings.model.model = name;
    }
    millis("DOSSIER_MODEL_TIMEOUT_MS", &mut settings.model.timeout_ms);

    if let Some(level) = text("DOSSIER_LOG_LEVEL") {
        settings.logging.level = level.to_lowercase();
    }
    flag("DOSSIER_LOG_JSON", &mut settings.logging.json);
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── deep_merge ───────────────────────────────────────────────────────

    #[test]
    fn deep_merge_nested_objects() {
        let base = json!({"skills": {"killSwitch": false, "remoteTimeoutMs": 10000}});
        let overlay = json!({"skills": {"killSwitch": true}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["skills"]["killSwitch"], true);
        assert_eq!(merged["skills"]["remoteTimeoutMs"], 10000);
    }

    #[test]
    fn deep_merge_arrays_replace() {
        let merged = deep_merge(json!({"a": [1, 2, 3]}), json!({"a": [9]}));
        assert_eq!(merged["a"], json!([9]));
    }

    #[test]
    fn deep_merge_null_keeps_base() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    // ── file loading ─────────────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(s.planner, DossierSettings::default().planner);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"planner": {"durationPerSectionMs": 1500}, "skills": {"allowFullContent": true}}"#,
        )
        .unwrap();

        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.planner.duration_per_section_ms, 1500);
        assert!(s.skills.allow_full_content);
        assert_eq!(s.planner.duration_base_ms.full_document, 10_000);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_matches!(load_settings_from_path(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn loaded_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"planner": {"availableAgents": []}}"#).unwrap();
        let s = load_settings_from_path(&path).unwrap();
        assert_eq!(s.planner.available_agents.len(), 3);
    }

    #[test]
    fn settings_path_ends_with_dossier_dir() {
        let path = settings_path();
        assert!(path.ends_with(".dossier/settings.json"));
    }

    // ── env overrides ────────────────────────────────────────────────────

    #[test]
    fn overrides_apply_typed_values() {
        let mut s = DossierSettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("DOSSIER_SKILLS_KILL_SWITCH", "true"),
                ("DOSSIER_SKILLS_REMOTE_URL", "http://localhost:9999"),
                ("DOSSIER_SKILLS_TIMEOUT_MS", "2500"),
                ("DOSSIER_MODEL_URL", "http://localhost:11434/v1"),
                ("DOSSIER_LOG_LEVEL", "DEBUG"),
                ("DOSSIER_LOG_JSON", "1"),
            ]),
        );
        assert!(s.skills.kill_switch);
        assert_eq!(s.skills.remote_base_url, "http://localhost:9999");
        assert_eq!(s.skills.remote_timeout_ms, 2500);
        assert_eq!(s.model.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(s.logging.level, "debug");
        assert!(s.logging.json);
    }

    #[test]
    fn bad_override_values_are_ignored() {
        let mut s = DossierSettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("DOSSIER_SKILLS_KILL_SWITCH", "maybe"),
                ("DOSSIER_SKILLS_TIMEOUT_MS", "soon"),
                ("DOSSIER_MODEL_NAME", "   "),
            ]),
        );
        assert!(!s.skills.kill_switch);
        assert_eq!(s.skills.remote_timeout_ms, 10_000);
        assert_eq!(s.model.model, "gpt-4o-mini");
    }

    #[test]
    fn no_overrides_leaves_defaults() {
        let mut s = DossierSettings::default();
        apply_overrides_from(&mut s, |_| None);
        assert_eq!(s, DossierSettings::default());
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
