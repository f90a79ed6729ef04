//! Fabrik CLI: discover an agent, generate scenarios for it, run them, and
//! diff two runs for regressions.
//!
//! Subcommands: `discover`, `gen`, `run`, `diff`.

mod log_format;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use fabrik::discovery::discover;
use fabrik::gateway::{LlmGateway, OpenAiCompatGateway};
use fabrik::generator::{generate, PlannerOptions};
use fabrik::runner::{load_yaml_scenario_file, registered_scenarios, run_all, RunOptions, Scenario};
use fabrik::store::TraceStore;
use fabrik_types::{AdapterConfig, ProfileSource, RequestFormat};

#[derive(Parser, Debug)]
#[command(name = "fabrik")]
#[command(about = "Discover, generate, run and diff AI agent evaluations")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Model name passed to the LLM gateway (default: gpt-4o-mini)
    #[arg(long, global = true, default_value = "gpt-4o-mini")]
    model: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover an agent under test from a local directory or a live HTTP endpoint.
    Discover {
        /// Local directory to inspect (mutually exclusive with --url)
        #[arg(long, value_name = "DIR", conflicts_with = "url")]
        path: Option<PathBuf>,
        /// Live HTTP endpoint to probe (mutually exclusive with --path)
        #[arg(long, value_name = "URL", conflicts_with = "path")]
        url: Option<String>,
        /// Free-text hint about what the agent does, used when evidence is thin
        #[arg(long)]
        hint: Option<String>,
    },
    /// Generate scenarios from a discovered agent profile.
    Gen {
        /// Path to a persisted agent-profile.json (default: ./.fabrik/agent-profile.json)
        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,
        /// Maximum number of scenarios to generate
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Directory to write generated scenario source files into
        #[arg(long, value_name = "DIR", default_value = ".fabrik/scenarios")]
        out: PathBuf,
    },
    /// Run scenarios against the agent under test and persist the results.
    Run {
        /// Directory of YAML scenario files
        #[arg(long, value_name = "DIR", default_value = ".fabrik/scenarios")]
        scenarios: PathBuf,
        /// URL of the agent under test's HTTP endpoint
        #[arg(long, value_name = "URL")]
        adapter_url: String,
        /// Version label this run is recorded under
        #[arg(long)]
        version: String,
        /// How many scenarios to run concurrently
        #[arg(long, default_value_t = 1)]
        parallelism: usize,
        /// Retries for a failing scenario
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Per-scenario timeout, in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        /// SQLite trace store path
        #[arg(long, value_name = "FILE", default_value = ".fabrik/trace.db")]
        store: PathBuf,
    },
    /// Compare two previously-run versions for regressions.
    Diff {
        /// SQLite trace store path
        #[arg(long, value_name = "FILE", default_value = ".fabrik/trace.db")]
        store: PathBuf,
        /// Baseline version label
        #[arg(long)]
        baseline: String,
        /// Candidate version label
        #[arg(long)]
        candidate: String,
        /// Score drop (0.0-1.0) that counts as a regression on its own
        #[arg(long, default_value_t = fabrik::diff::DEFAULT_SCORE_DROP_THRESHOLD)]
        score_drop_threshold: f64,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("warning: failed to initialize logging: {e}");
    }
    let _ = config::load_and_apply("fabrik", None);

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = OpenAiCompatGateway::from_env(&args.model)?;

    match args.cmd {
        Command::Discover { path, url, hint } => discover_cmd(&gateway, path, url, hint).await,
        Command::Gen { profile, count, out } => gen_cmd(&gateway, profile, count, out).await,
        Command::Run {
            scenarios,
            adapter_url,
            version,
            parallelism,
            retries,
            timeout_secs,
            store,
        } => {
            run_cmd(
                &gateway,
                scenarios,
                adapter_url,
                version,
                parallelism,
                retries,
                timeout_secs,
                store,
            )
            .await
        }
        Command::Diff {
            store,
            baseline,
            candidate,
            score_drop_threshold,
        } => diff_cmd(store, baseline, candidate, score_drop_threshold).await,
    }
}

async fn discover_cmd(
    gateway: &dyn LlmGateway,
    path: Option<PathBuf>,
    url: Option<String>,
    hint: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = match (path, url) {
        (Some(path), None) => ProfileSource::LocalDir {
            path: path.display().to_string(),
        },
        (None, Some(url)) => ProfileSource::HttpEndpoint { url },
        _ => return Err("discover needs exactly one of --path or --url".into()),
    };

    let profile = discover(gateway, source, hint.as_deref()).await;
    let cwd = std::env::current_dir()?;
    fabrik::discovery::persist_profile(&cwd, &profile)?;

    if let Some(warning) = fabrik::discovery::staleness_warning(&profile) {
        eprintln!("warning: {warning}");
    }
    println!(
        "discovered \"{}\" (confidence {:.2}, {} tools) -> .fabrik/agent-profile.json",
        profile.name,
        profile.confidence,
        profile.tools.len()
    );
    Ok(())
}

async fn gen_cmd(
    gateway: &dyn LlmGateway,
    profile_path: Option<PathBuf>,
    count: usize,
    out: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile_path = profile_path.unwrap_or_else(|| PathBuf::from(".fabrik/agent-profile.json"));
    let profile_json = std::fs::read_to_string(&profile_path)
        .map_err(|e| format!("reading {}: {e}", profile_path.display()))?;
    let profile: fabrik_types::AgentProfile = serde_json::from_str(&profile_json)?;

    let opts = PlannerOptions {
        count,
        categories: None,
    };
    let artifacts = generate(gateway, &profile, &opts).await?;

    std::fs::create_dir_all(&out)?;
    for (i, artifact) in artifacts.iter().enumerate() {
        let file_name = format!("{i:03}-{}.yaml", artifact.scenario.slug);
        std::fs::write(out.join(&file_name), &artifact.source)?;
    }
    println!("wrote {} scenario(s) to {}", artifacts.len(), out.display());
    Ok(())
}

fn load_scenarios(dir: &std::path::Path) -> std::io::Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml")
                && path.extension().and_then(|e| e.to_str()) != Some("yml")
            {
                continue;
            }
            match load_yaml_scenario_file(&path) {
                Ok(scenario) => scenarios.push(scenario),
                Err(e) => eprintln!("warning: skipping {}: {e}", path.display()),
            }
        }
    }
    scenarios.extend(registered_scenarios());
    Ok(scenarios)
}

/// Loads `./.fabrik/agent-profile.json` if present, so a bound profile
/// context reaches the judge prompts during `run`. A missing or unreadable
/// file just means no profile is bound, not a hard error.
fn load_profile_for_run() -> Option<fabrik_types::AgentProfile> {
    let json = std::fs::read_to_string(".fabrik/agent-profile.json").ok()?;
    serde_json::from_str(&json).ok()
}

#[allow(clippy::too_many_arguments)]
async fn run_cmd(
    gateway: &dyn LlmGateway,
    scenarios_dir: PathBuf,
    adapter_url: String,
    version: String,
    parallelism: usize,
    retries: u32,
    timeout_secs: u64,
    store_path: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenarios = load_scenarios(&scenarios_dir)?;
    if scenarios.is_empty() {
        return Err(format!("no scenarios found under {}", scenarios_dir.display()).into());
    }

    let adapter = fabrik::adapter::HttpAdapter::new(&AdapterConfig::Http {
        url: adapter_url,
        headers: None,
        request_format: RequestFormat::Messages,
        body_template: None,
        response_parser: None,
        streaming: false,
    })?;

    let opts = RunOptions {
        timeout: Duration::from_secs(timeout_secs),
        retries,
        parallelism: parallelism.max(1),
    };
    let profile = load_profile_for_run();
    let results = run_all(gateway, &adapter, &scenarios, &opts, profile.as_ref()).await;

    let passed = results.iter().filter(|r| r.passed).count();
    println!("{passed}/{} scenarios passed", results.len());

    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let trace_store = TraceStore::new(&store_path)?;
    let run_id = uuid_like_id();
    let stored = fabrik_types::StoredRun::new(run_id, version, results);
    trace_store.save_run(stored).await?;
    Ok(())
}

async fn diff_cmd(
    store_path: PathBuf,
    baseline: String,
    candidate: String,
    score_drop_threshold: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let trace_store = TraceStore::new(&store_path)?;
    let baseline_run = trace_store
        .load_by_version(&baseline)
        .await?
        .ok_or(format!("no run found for version {baseline}"))?;
    let candidate_run = trace_store
        .load_by_version(&candidate)
        .await?
        .ok_or(format!("no run found for version {candidate}"))?;

    let report = fabrik::diff::diff(&baseline_run, &candidate_run, score_drop_threshold);
    println!(
        "{} regression(s), {} added, {} removed, {} unchanged",
        report.regressions.len(),
        report.added.len(),
        report.removed.len(),
        report.unchanged
    );
    for regression in &report.regressions {
        println!(
            "  REGRESSION {}: passed {} -> {}, score {:.2} -> {:.2}",
            regression.scenario,
            regression.previous_passed,
            regression.current_passed,
            regression.previous_score,
            regression.current_score,
        );
    }
    if !report.regressions.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Id for a run row.
fn uuid_like_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
