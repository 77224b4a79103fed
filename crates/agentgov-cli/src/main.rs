//! AgentGov CLI
//!
//! The `agentgov` command delegates tasks to AI agents behind authority and
//! confidence gates, and keeps the audit trail.
//!
//! ## Commands
//!
//! - `delegate`: Run one task on a named agent
//! - `run`: Delegate task definition files through the agent selector
//! - `consolidate`: Aggregate agent result files into a batch report
//! - `audit`: Append manual entries to, or print, the audit trail
//! - `sync-models`: Pull the local models a roadmap week needs
//!
//! Status lines for calling pipelines go to stdout; fatal errors go to
//! stderr as a single JSON line. Exit codes: 0 success, 1 fatal error or
//! failed batch, 2 delegation aborted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use agentgov_core::{
    consolidate_dir, sync_with_roadmap, write_report, AgentConfig, AgentDirectory, AuthorityLevel,
    CommandModelPuller, CommandProvider, DelegationEngine, DelegationOutcome, GovernanceConfig,
    ModelSchedule, ModelSyncState, ProviderRegistry, StatusLine, Task,
};
use anyhow::{Context, Result};
use audit_trail::{ActionDescriptor, ArtifactRef, AuditRecord, AuditStore, YamlAuditLedger};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, Level};

const EXIT_FATAL: u8 = 1;
const EXIT_ABORTED: u8 = 2;

#[derive(Parser)]
#[command(name = "agentgov")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Confidence-gated task delegation to AI agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    paths: PathOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct PathOpts {
    /// Directory holding one `<agent>.json` config per agent
    #[arg(long, global = true, env = "AGENTGOV_CONFIG_DIR", default_value = ".ai/config")]
    config_dir: PathBuf,

    /// Governance file with policies and selection preferences
    #[arg(long, global = true, env = "AGENTGOV_POLICY_FILE")]
    policy_file: Option<PathBuf>,

    /// YAML audit trail
    #[arg(
        long,
        global = true,
        env = "AGENTGOV_AUDIT_LOG",
        default_value = "AI_CONTRIB_LOG.yaml"
    )]
    audit_log: PathBuf,

    /// Directory for result and output artifacts
    #[arg(long, global = true, env = "AGENTGOV_LOGS_DIR", default_value = ".ai/logs")]
    logs_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Delegate a task to a named agent and log its confidence
    Delegate {
        /// Agent name; maps to `<config-dir>/<agent>.json`
        #[arg(long)]
        agent: String,

        /// Action performed, e.g. `code_review`; also the task type
        #[arg(long)]
        task_summary: String,

        /// Full prompt sent to the model
        #[arg(long)]
        task_prompt: String,

        /// Pull request the task belongs to
        #[arg(long)]
        pr_number: String,

        /// Authority the task requires
        #[arg(long, default_value = "CONTRIBUTOR")]
        required_authority: AuthorityLevel,

        /// Where to write artifacts (default: --logs-dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Delegate task definition files through the agent selector
    Run {
        /// Task definition files (JSON)
        #[arg(required = true)]
        tasks: Vec<PathBuf>,

        /// Maximum delegations in flight
        #[arg(long, default_value = "4")]
        max_concurrent: usize,

        /// Where to write artifacts (default: --logs-dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Consolidate agent result files into one report
    Consolidate {
        /// Directory with `*-result.json` files (default: --logs-dir)
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Path of the consolidated report
        #[arg(long)]
        output_file: PathBuf,
    },

    /// Audit trail operations
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Pull the local models required for a roadmap week
    SyncModels {
        /// Roadmap week
        #[arg(long)]
        week: u32,

        /// Model runtime command
        #[arg(long, default_value = "ollama")]
        runtime: String,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Append an entry that carries no confidence assessment
    Append {
        #[arg(long)]
        task_id: String,

        #[arg(long)]
        agent: String,

        /// Action type, e.g. `manual_review`
        #[arg(long)]
        action_type: String,

        #[arg(long)]
        summary: String,

        /// Artifact as `kind=path`; repeatable
        #[arg(long = "artifact", value_parser = parse_artifact)]
        artifacts: Vec<ArtifactRef>,
    },

    /// Print every entry as one JSON line
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    agentgov_core::init_tracing(cli.json, level);

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", StatusLine::error(format!("{e:#}")).render());
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let paths = cli.paths;
    match cli.command {
        Commands::Delegate {
            agent,
            task_summary,
            task_prompt,
            pr_number,
            required_authority,
            output_dir,
        } => {
            let task = Task::new(
                format!("pr-{pr_number}"),
                task_summary.clone(),
                task_prompt,
                required_authority,
            )
            .with_summary(format!("Performed {task_summary} on PR #{pr_number}."));
            let output_dir = output_dir.unwrap_or_else(|| paths.logs_dir.clone());
            cmd_delegate(&paths, &agent, &task, &output_dir).await
        }
        Commands::Run {
            tasks,
            max_concurrent,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| paths.logs_dir.clone());
            cmd_run(&paths, &tasks, max_concurrent, &output_dir).await
        }
        Commands::Consolidate {
            input_dir,
            output_file,
        } => {
            let input_dir = input_dir.unwrap_or_else(|| paths.logs_dir.clone());
            cmd_consolidate(&input_dir, &output_file).await
        }
        Commands::Audit { action } => match action {
            AuditAction::Append {
                task_id,
                agent,
                action_type,
                summary,
                artifacts,
            } => {
                let record = AuditRecord::unassessed(
                    task_id,
                    agent,
                    ActionDescriptor::new(action_type, summary),
                    artifacts,
                );
                cmd_audit_append(&paths.audit_log, &record).await
            }
            AuditAction::List => cmd_audit_list(&paths.audit_log).await,
        },
        Commands::SyncModels { week, runtime } => cmd_sync_models(week, &runtime).await,
    }
}

/// `kind=path`, e.g. `screenshot=out/diff.png`.
fn parse_artifact(s: &str) -> std::result::Result<ArtifactRef, String> {
    match s.split_once('=') {
        Some((kind, path)) if !kind.trim().is_empty() && !path.trim().is_empty() => {
            Ok(ArtifactRef::new(kind.trim(), path.trim()))
        }
        _ => Err(format!("expected KIND=PATH, got '{s}'")),
    }
}

/// Register a command-backed provider for every agent that names one.
fn provider_registry(agents: &AgentDirectory) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (name, config) in agents.iter() {
        match CommandProvider::from_config(config) {
            Some(provider) => registry.register_agent(name, Arc::new(provider)),
            None => debug!(agent = name, "no backend command configured"),
        }
    }
    registry
}

fn load_governance(policy_file: Option<&Path>) -> Result<GovernanceConfig> {
    match policy_file {
        Some(path) => GovernanceConfig::load(path)
            .with_context(|| format!("Failed to load governance file {}", path.display())),
        None => Ok(GovernanceConfig::standard()),
    }
}

fn build_engine(paths: &PathOpts, agents: AgentDirectory, output_dir: &Path) -> Result<DelegationEngine> {
    let governance = load_governance(paths.policy_file.as_deref())?;
    let providers = provider_registry(&agents);
    let audit = Arc::new(YamlAuditLedger::new(&paths.audit_log));
    Ok(DelegationEngine::new(
        agents,
        Arc::new(governance.policy_store()),
        governance.preferences,
        providers,
        audit,
    )
    .with_output_dir(output_dir))
}

/// Print the outcome's status line and return its exit code.
fn report_outcome(task_id: &str, outcome: &DelegationOutcome) -> u8 {
    match outcome {
        DelegationOutcome::Logged(done) => {
            let record = &done.record;
            let mut line = StatusLine::success()
                .with("task_id", &record.task_id)
                .with("agent", &record.agent_id)
                .with("log_id", record.log_id)
                .with("confidence_level", record.confidence.level)
                .with("confidence_score", record.confidence.score)
                .with("human_oversight_required", record.flags.human_oversight_required())
                .with("escalation_triggered", record.flags.escalation_triggered());
            if let Some(artifacts) = &done.artifacts {
                line = line
                    .with("log_file", &artifacts.result_file)
                    .with("generated_output_file", &artifacts.output_file);
            }
            if let Some(conflict) = &done.conflict {
                line = line.with("conflicting_agents", &conflict.agents);
            }
            println!("{}", line.render());
            0
        }
        DelegationOutcome::Aborted(reason) => {
            println!(
                "{}",
                StatusLine::aborted(reason.state(), reason)
                    .with("task_id", task_id)
                    .render()
            );
            EXIT_ABORTED
        }
    }
}

async fn cmd_delegate(paths: &PathOpts, agent: &str, task: &Task, output_dir: &Path) -> Result<u8> {
    let config = AgentConfig::load(&paths.config_dir, agent)
        .with_context(|| format!("Failed to load configuration for agent '{agent}'"))?;
    let agents = AgentDirectory::new().with_agent(agent, config);
    let engine = build_engine(paths, agents, output_dir)?;

    let outcome = engine
        .delegate_to(agent, task)
        .await
        .with_context(|| format!("Delegation of {} to '{agent}' failed", task.id))?;
    Ok(report_outcome(&task.id, &outcome))
}

async fn cmd_run(
    paths: &PathOpts,
    task_files: &[PathBuf],
    max_concurrent: usize,
    output_dir: &Path,
) -> Result<u8> {
    let tasks = task_files
        .iter()
        .map(|path| {
            Task::load(path).with_context(|| format!("Failed to load task {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let agents = AgentDirectory::load_dir(&paths.config_dir).with_context(|| {
        format!(
            "Failed to load agent configs from {}",
            paths.config_dir.display()
        )
    })?;
    info!(tasks = tasks.len(), agents = agents.len(), "starting orchestration");

    let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let engine = Arc::new(build_engine(paths, agents, output_dir)?);
    let results = engine.delegate_all(tasks, max_concurrent).await;

    let mut fatal = false;
    let mut aborted = false;
    for (task_id, result) in ids.iter().zip(results) {
        match result {
            Ok(outcome) => aborted |= report_outcome(task_id, &outcome) != 0,
            Err(e) => {
                fatal = true;
                eprintln!(
                    "{}",
                    StatusLine::error(&e)
                        .with("task_id", task_id)
                        .with("state", e.state())
                        .render()
                );
            }
        }
    }

    Ok(if fatal {
        EXIT_FATAL
    } else if aborted {
        EXIT_ABORTED
    } else {
        0
    })
}

async fn cmd_consolidate(input_dir: &Path, output_file: &Path) -> Result<u8> {
    let report = consolidate_dir(input_dir)
        .await
        .with_context(|| format!("Failed to scan {}", input_dir.display()))?;
    write_report(output_file, &report)
        .with_context(|| format!("Failed to write report {}", output_file.display()))?;

    let summary = &report.summary;
    let status = if report.passed() { "success" } else { "failure" };
    println!(
        "{}",
        StatusLine::new(status)
            .with("report_file", output_file)
            .with("total_agents_processed", summary.total_agents_processed)
            .with("successful_agents", summary.successful_agents)
            .with("failed_agents", summary.failed_agents)
            .with("overall_human_oversight_required", summary.overall_human_oversight_required)
            .with("overall_escalation_triggered", summary.overall_escalation_triggered)
            .with("message", &summary.message)
            .render()
    );
    Ok(if report.passed() { 0 } else { EXIT_FATAL })
}

async fn cmd_audit_append(audit_log: &Path, record: &AuditRecord) -> Result<u8> {
    let ledger = YamlAuditLedger::new(audit_log);
    ledger
        .append(record)
        .await
        .with_context(|| format!("Failed to append to audit trail {}", audit_log.display()))?;

    println!(
        "{}",
        StatusLine::success()
            .with("log_id", record.log_id)
            .with("audit_log", audit_log)
            .render()
    );
    Ok(0)
}

async fn cmd_audit_list(audit_log: &Path) -> Result<u8> {
    let ledger = YamlAuditLedger::new(audit_log);
    let records = ledger
        .records()
        .await
        .with_context(|| format!("Failed to read audit trail {}", audit_log.display()))?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    debug!(entries = records.len(), "listed audit trail");
    Ok(0)
}

async fn cmd_sync_models(week: u32, runtime: &str) -> Result<u8> {
    let argv: Vec<String> = runtime.split_whitespace().map(str::to_string).collect();
    let puller = CommandModelPuller::new(argv).context("--runtime must name a program")?;

    let mut state = ModelSyncState::default();
    sync_with_roadmap(&mut state, &ModelSchedule::standard(), week, &puller)
        .await
        .with_context(|| format!("Model sync for week {week} failed"))?;

    println!(
        "{}",
        StatusLine::success()
            .with("week", week)
            .with("active_model", &state.active_model)
            .with("sync_status", state.status)
            .render()
    );
    Ok(0)
}
