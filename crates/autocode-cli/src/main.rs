//! autocode CLI - turn a project idea into code, tests, docs and a Dockerfile
//!
//! Usage:
//!   autocode init                 Write a default .autocode/config.toml
//!   autocode run <idea>           Run the full pipeline
//!   autocode plan <idea>          Run the planning stage only
//!   autocode estimate             Show the cost estimate
//!   autocode show                 Print a saved session
//!   autocode sessions             List saved sessions

use anyhow::{bail, Context as _, Result};
use autocode_agent::{credential_from_env, CallOptions, Gateway, RetryPolicy, UsageLedger};
use autocode_core::{AutocodeConfig, Context};
use autocode_orchestrator::{
    Pipeline, PlanningStage, RunReport, RunState, SessionStore, Stage, StageKind, StageStatus,
};
use autocode_planning::{estimate_cost, Plan};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "autocode")]
#[command(author, version, about = "Staged LLM pipeline from idea to published project")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root holding .autocode/config.toml
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run the full pipeline for a project idea
    Run {
        /// Natural-language project idea
        idea: String,

        /// Session id to save under (defaults to session.default_session)
        #[arg(short, long)]
        session: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Break a project idea into tasks without running later stages
    Plan {
        /// Natural-language project idea
        idea: String,
    },

    /// Show the cost estimate from the configured tables
    Estimate {
        /// Use the plan stored in this session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Print a saved session
    Show {
        #[arg(short, long)]
        session: Option<String>,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List saved sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides --verbose
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = cli.root;
    match cli.command {
        Commands::Init { force } => cmd_init(&root, force),
        Commands::Run {
            idea,
            session,
            json,
        } => cmd_run(&root, idea, session, json).await,
        Commands::Plan { idea } => cmd_plan(&root, idea).await,
        Commands::Estimate { session } => cmd_estimate(&root, session).await,
        Commands::Show { session, json } => cmd_show(&root, session, json).await,
        Commands::Sessions => cmd_sessions(&root).await,
    }
}

fn load_config(root: &Path) -> Result<AutocodeConfig> {
    let mut config = AutocodeConfig::load_or_default(root)
        .with_context(|| format!("Failed to load config under {}", root.display()))?;

    // Relative paths in the config are relative to the workspace root
    config.session.root = root.join(&config.session.root);
    config.outputs.dir = root.join(&config.outputs.dir);
    config.outputs.archive_file = root.join(&config.outputs.archive_file);
    Ok(config)
}

fn session_store(config: &AutocodeConfig) -> SessionStore {
    SessionStore::new(&config.session.root)
}

fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let path = AutocodeConfig::path_in(root);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let written = AutocodeConfig::write_default(root).context("Failed to write config")?;
    println!("Initialized autocode in {}", root.display());
    println!("Created:");
    println!("  {}", written.display());
    println!();
    println!("Export the service credential before running:");
    println!("  export {}=...", AutocodeConfig::default().gateway.api_key_env);
    Ok(())
}

async fn cmd_run(root: &Path, idea: String, session: Option<String>, json: bool) -> Result<()> {
    let config = load_config(root)?;
    let session_id = session.unwrap_or_else(|| config.session.default_session.clone());

    // Planning would degrade without a credential, but every later stage needs it
    if credential_from_env(&config.gateway.api_key_env).is_none() {
        bail!(
            "{} is not set. Export it or change gateway.api_key_env in {}",
            config.gateway.api_key_env,
            AutocodeConfig::path_in(root).display()
        );
    }

    let ledger = Arc::new(UsageLedger::new());
    let gateway = Gateway::from_config(&config.gateway, Arc::clone(&ledger))
        .context("Failed to create service gateway")?;
    let pipeline = Pipeline::standard(&config, Arc::new(gateway), ledger)
        .context("Failed to build pipeline")?;

    info!("Running pipeline for session '{}'", session_id);
    let report = pipeline
        .run(&idea, &session_id)
        .await
        .context("Pipeline run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match &report.state {
        RunState::Completed => Ok(()),
        RunState::Aborted { stage, reason } => match stage {
            Some(stage) => bail!("Pipeline aborted at {}: {}", stage, reason),
            None => bail!("Pipeline aborted: {}", reason),
        },
    }
}

fn print_report(report: &RunReport) {
    println!("Run {} (session '{}')", report.run_id, report.session_id);
    println!("=========================================");
    for record in &report.stages {
        let status = match record.status {
            StageStatus::Completed => "ok",
            StageStatus::Degraded => "degraded",
            StageStatus::Failed => "FAILED",
            StageStatus::Ignored => "failed (ignored)",
        };
        print!("  {:<18} {:<16} {:>7} ms", record.stage.name(), status, record.elapsed_ms);
        match &record.detail {
            Some(detail) => println!("  {}", detail),
            None => println!(),
        }
    }

    let vars = &report.context.variables;
    if let Some(estimate) = vars.get(StageKind::EstimateCost.variable_key()) {
        println!(
            "\nEstimated cost: ${} | Team size: {} | Duration: {} weeks",
            estimate["estimated_total_cost_usd"],
            estimate["estimated_team_size"],
            estimate["estimated_duration_weeks"]
        );
    }
    if let Some(location) = vars
        .get(StageKind::Publish.variable_key())
        .and_then(|v| v.as_str())
    {
        println!("Published to: {}", location);
    }

    println!(
        "\nTokens used: {} over {} calls (${:.4})",
        report.usage.total_tokens, report.usage.calls, report.usage.total_cost
    );
    if let Some(path) = &report.snapshot_path {
        println!("Snapshot: {}", path.display());
    }
    if let Some(err) = &report.persist_error {
        println!("Warning: session was not saved: {}", err);
    }
}

async fn cmd_plan(root: &Path, idea: String) -> Result<()> {
    let config = load_config(root)?;
    let ledger = Arc::new(UsageLedger::new());
    let gateway = Gateway::from_config(&config.gateway, Arc::clone(&ledger))
        .context("Failed to create service gateway")?;
    let retry = RetryPolicy::from_config(&config.retry).context("Invalid retry settings")?;
    let stage = PlanningStage::new(
        Arc::new(gateway),
        retry,
        CallOptions::from_config(&config.gateway),
    )?;

    let mut ctx = Context::new();
    ctx.set_goal(idea.trim())?;
    let artifact = stage.run(&ctx).await?;
    let plan: Plan = serde_json::from_value(artifact.value)?;

    println!("Plan for: {}", plan.goal);
    if let Some(reason) = &artifact.degraded {
        println!("(fallback plan used: {})", reason);
    }
    for (idx, task) in plan.tasks.iter().enumerate() {
        println!("  {}. {}", idx + 1, task);
    }
    Ok(())
}

async fn cmd_estimate(root: &Path, session: Option<String>) -> Result<()> {
    let config = load_config(root)?;

    let plan = match session {
        Some(id) => {
            let ctx = session_store(&config).load(&id).await?;
            ctx.get_variable_as::<Plan>(StageKind::Plan.variable_key())?
                .with_context(|| format!("Session '{}' has no plan", id))?
        }
        None => Plan::new("", Vec::new()),
    };

    let estimate = estimate_cost(&plan, &config.estimator);
    println!("Phases:");
    for phase in &config.estimator.phases {
        println!("  {:<24} {:>3} weeks", phase.name, phase.weeks);
    }
    println!("Roles:");
    for role in &config.estimator.roles {
        println!(
            "  {:<24} {} x ${}/month",
            role.role, role.headcount, role.monthly_salary_usd
        );
    }
    println!(
        "\nEstimated cost: ${} | Team size: {} | Duration: {} weeks",
        estimate.estimated_total_cost_usd,
        estimate.estimated_team_size,
        estimate.estimated_duration_weeks
    );
    Ok(())
}

async fn cmd_show(root: &Path, session: Option<String>, json: bool) -> Result<()> {
    let config = load_config(root)?;
    let session_id = session.unwrap_or_else(|| config.session.default_session.clone());
    let ctx = session_store(&config).load(&session_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);
        return Ok(());
    }

    if ctx.is_empty() {
        println!("Session '{}' has no saved context", session_id);
        return Ok(());
    }

    println!("Session: {}", session_id);
    println!("Goal: {}", ctx.goal().unwrap_or("(none)"));

    println!("\nTasks: {}", ctx.tasks().len());
    for task in ctx.tasks() {
        println!("  - {}", task);
    }

    println!("\nVariables:");
    for key in ctx.variables().keys() {
        println!("  {}", key);
    }

    println!("\nHistory:");
    for entry in ctx.history() {
        println!("  [{:>3}] {}: {}", entry.position, entry.event, entry.detail);
    }
    Ok(())
}

async fn cmd_sessions(root: &Path) -> Result<()> {
    let config = load_config(root)?;
    let ids = session_store(&config).list().await?;

    if ids.is_empty() {
        println!("No saved sessions in {}", config.session.root.display());
    } else {
        for id in ids {
            println!("{}", id);
        }
    }
    Ok(())
}
