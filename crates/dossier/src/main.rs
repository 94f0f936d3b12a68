//! # dossier
//!
//! Command-line front end: runs review flows, plans re-review scope and
//! lists the built-in flows. Results go to stdout as pretty JSON, logs go
//! to stderr.

#![deny(unsafe_code)]

mod wiring;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dossier_core::ExecutionMode;
use dossier_runtime::{FlowRegistry, OrchestrationRequest, StepPhase};
use dossier_scope::{ExternalEdit, ExternalSection, plan_external};
use dossier_settings::DossierSettings;
use dossier_skills::{InvocationSink, MemorySink, TracingSink};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

/// Dossier review engine.
#[derive(Parser, Debug)]
#[command(name = "dossier", about = "Multi-step compliance and contract review")]
struct Cli {
    /// Settings file (defaults to `~/.dossier/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides settings; `RUST_LOG` still wins).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a review flow over one section.
    Review(ReviewArgs),
    /// Decide which sections to re-review after edits.
    Plan(PlanArgs),
    /// List the built-in flows and their steps.
    Flows,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Orchestration request (JSON).
    #[arg(long)]
    input: PathBuf,

    /// Flow id (overrides the request's `flow_id`).
    #[arg(long)]
    flow: Option<String>,

    /// Agent execution mode: `fake` or `real`.
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// Step to skip. Repeatable.
    #[arg(long = "skip", value_name = "STEP")]
    skip: Vec<String>,

    /// Route skill calls through the remote transport.
    #[arg(long)]
    remote_skills: bool,

    /// Include the skill invocation audit trail in the output.
    #[arg(long)]
    audit: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Edits since the last review (JSON array).
    #[arg(long)]
    queue: PathBuf,

    /// Sections of the document (JSON array).
    #[arg(long)]
    sections: PathBuf,
}

// ─── Input ───────────────────────────────────────────────────────────

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn load_settings(cli: &Cli) -> Result<DossierSettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(dossier_settings::settings_path);
    if cli.config.is_some() && !path.exists() {
        bail!("settings file not found: {}", path.display());
    }
    dossier_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))
}

/// Read the request file and apply command-line overrides.
fn load_request(args: &ReviewArgs) -> Result<OrchestrationRequest> {
    let mut raw: Value = read_json(&args.input)?;
    if let Some(flow) = &args.flow {
        let Some(object) = raw.as_object_mut() else {
            bail!("{} must contain a JSON object", args.input.display());
        };
        let _ = object.insert("flow_id".into(), Value::String(flow.clone()));
    }

    let mut request: OrchestrationRequest = serde_json::from_value(raw)
        .with_context(|| format!("invalid orchestration request in {}", args.input.display()))?;
    if let Some(mode) = args.mode {
        request.options.mode = mode;
    }
    for step in &args.skip {
        if !request.options.skip_steps.contains(step) {
            request.options.skip_steps.push(step.clone());
        }
    }
    request.options.remote_skills |= args.remote_skills;
    Ok(request)
}

// ─── Commands ────────────────────────────────────────────────────────

/// Run one review. Returns the output document and whether the run succeeded.
async fn review(settings: &DossierSettings, args: &ReviewArgs) -> Result<(Value, bool)> {
    let request = load_request(args)?;
    let memory = Arc::new(MemorySink::new());
    let sink: Arc<dyn InvocationSink> = if args.audit {
        memory.clone()
    } else {
        Arc::new(TracingSink)
    };
    let orchestrator = wiring::orchestrator(settings, sink)
        .context("failed to build the built-in flows")?;

    info!(flow = %request.flow_id, document = %request.document_id, "review started");
    let response = orchestrator.orchestrate(request).await;
    let ok = response.ok;

    let output = if args.audit {
        json!({
            "response": response,
            "skill_invocations": memory.snapshot(),
        })
    } else {
        serde_json::to_value(&response)?
    };
    Ok((output, ok))
}

fn plan(settings: &DossierSettings, args: &PlanArgs) -> Result<Value> {
    let edits: Vec<ExternalEdit> = read_json(&args.queue)?;
    let sections: Vec<ExternalSection> = read_json(&args.sections)?;
    let config = wiring::planner_config(&settings.planner);
    let report = plan_external(&edits, &sections, &config).context("scope planning failed")?;
    if report.nothing_to_review {
        info!(
            discarded = report.discarded_sections.len(),
            "no dirty sections remain, nothing to review"
        );
    }
    Ok(serde_json::to_value(report)?)
}

fn flows() -> Result<Value> {
    let registry = FlowRegistry::builtin().context("failed to build the built-in flows")?;
    let listing: Vec<Value> = registry
        .ids()
        .into_iter()
        .filter_map(|id| registry.get(id))
        .map(|flow| {
            let steps: Vec<Value> = flow
                .steps()
                .map(|(phase, step)| {
                    json!({
                        "step_id": step.id,
                        "phase": phase,
                        "target_kind": step.target.kind(),
                        "target": step.target.name(),
                        "artifact_key": step.artifact_key,
                        "critical": step.critical && phase != StepPhase::Finalization,
                        "conditional": step.condition.is_some(),
                    })
                })
                .collect();
            json!({ "flow_id": flow.id(), "steps": steps })
        })
        .collect();
    Ok(Value::Array(listing))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = load_settings(&cli)?;
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    dossier_core::logging::init_subscriber(level, settings.logging.json);

    match &cli.command {
        Command::Review(args) => {
            let (output, ok) = review(&settings, args).await?;
            print_json(&output)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Plan(args) => {
            print_json(&plan(&settings, args)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Flows => {
            print_json(&flows()?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
