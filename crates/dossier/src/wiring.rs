//! Settings to per-crate configuration.
//!
//! Settings are read once at start-up and turned into explicit config values
//! here. Nothing below the binary sees [`DossierSettings`].

use std::sync::Arc;
use std::time::Duration;

use dossier_agents::{AgentRegistry, ModelConfig, ModelReviewer};
use dossier_runtime::{FlowRegistry, ReviewOrchestrator, RuntimeError, TracingObserver};
use dossier_scope::{DurationBase, PlannerConfig};
use dossier_settings::{DossierSettings, ModelSettings, PlannerSettings, SkillSettings};
use dossier_skills::{InvocationSink, SkillCatalog, SkillDispatcher, TransportConfig};
use tracing::{debug, info};

// ─── Conversions ─────────────────────────────────────────────────────

/// Transport configuration from the `skills` section.
pub fn transport_config(skills: &SkillSettings) -> TransportConfig {
    TransportConfig {
        kill_switch: skills.kill_switch,
        remote_base_url: skills.remote_base_url.clone(),
        timeout: Duration::from_millis(skills.remote_timeout_ms),
        allow_full_content: skills.allow_full_content,
        test_mode: skills.test_mode,
    }
}

/// Scope planner configuration from the `planner` section.
pub fn planner_config(planner: &PlannerSettings) -> PlannerConfig {
    PlannerConfig {
        high_risk_keywords: planner
            .high_risk_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect(),
        available_agents: planner.available_agents.clone(),
        duration_base: DurationBase {
            section_only_ms: planner.duration_base_ms.section_only,
            cross_section_ms: planner.duration_base_ms.cross_section,
            full_document_ms: planner.duration_base_ms.full_document,
        },
        duration_per_section_ms: planner.duration_per_section_ms,
    }
}

/// Model endpoint configuration, if one is configured.
///
/// The API key is looked up through `lookup` under the variable named by
/// `apiKeyEnv`; an empty value counts as unset.
pub fn model_config(
    model: &ModelSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<ModelConfig> {
    let base_url = model.base_url.as_deref()?.trim();
    if base_url.is_empty() {
        return None;
    }
    let mut config = ModelConfig::new(base_url, model.model.clone());
    config.timeout = Duration::from_millis(model.timeout_ms);
    config.api_key = lookup(&model.api_key_env).filter(|key| !key.is_empty());
    Some(config)
}

// ─── Assembly ────────────────────────────────────────────────────────

/// Built-in agents, with the model-backed reviewer swapped in when a model
/// endpoint is configured.
pub fn agent_registry(model: Option<ModelConfig>) -> AgentRegistry {
    let mut registry = AgentRegistry::builtin();
    if let Some(config) = model {
        info!(base_url = %config.base_url, model = %config.model, "model reviewer enabled");
        registry.register(Arc::new(ModelReviewer::new(config)));
    }
    registry
}

/// Orchestrator over the built-in flows, wired from `settings`.
pub fn orchestrator(
    settings: &DossierSettings,
    sink: Arc<dyn InvocationSink>,
) -> Result<ReviewOrchestrator, RuntimeError> {
    let transport = transport_config(&settings.skills);
    debug!(
        kill_switch = transport.kill_switch,
        remote = %transport.remote_base_url,
        "skill transport configured"
    );
    let skills =
        SkillDispatcher::new(Arc::new(SkillCatalog::builtin()), transport).with_sink(sink);
    let agents = agent_registry(model_config(&settings.model, |name| std::env::var(name).ok()));

    Ok(ReviewOrchestrator::new(
        Arc::new(FlowRegistry::builtin()?),
        Arc::new(agents),
        Arc::new(skills),
    )
    .with_observer(Arc::new(TracingObserver)))
}
