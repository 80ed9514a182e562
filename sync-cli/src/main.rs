use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use smart_sync::{
    config::SmartSyncConfig,
    run_step,
    scenario::{self, HostOs},
    SmartSyncManager, StepStatus, SyncAction, SyncDirection, SyncHooks, SyncLog, SyncOperation, SyncOutcome,
};
use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};
use tokio::process::Command;
use tracing::{error, info, warn};

mod telemetry;

const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(name = "smart-sync")]
#[command(about = "Mirror a network project directory to local disk around workflow steps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to the SMART_SYNC_* environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a project path needs Smart Sync on this host
    Detect {
        /// Project path as the user selected it
        path: String,
    },
    /// Populate the local root from the network root
    Setup,
    /// Pull network changes into the local root
    Down,
    /// Push local changes to the network root
    Up,
    /// Show what the next sync would do without doing it
    Preview {
        /// Direction to plan (up or down)
        direction: SyncDirection,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the last recorded sync
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one workflow step between the sync hooks
    Run {
        /// Step name used in warnings and logs
        step: String,

        /// Command to run in the local root
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Show current configuration
    Show,
    /// Generate a configuration file
    Generate {
        /// Network project path to prefill
        #[arg(long)]
        network: Option<PathBuf>,

        /// Output path for configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// How a `run` step ended
enum StepRun {
    Exited(ExitStatus),
    Interrupted,
    SpawnFailed(std::io::Error),
}

impl StepStatus for StepRun {
    fn succeeded(&self) -> bool {
        matches!(self, StepRun::Exited(status) if status.success())
    }
}

#[derive(Serialize)]
struct StatusReport {
    enabled: bool,
    network_root: PathBuf,
    local_root: PathBuf,
    initialized: bool,
    last_sync: Option<SyncOperation>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Held until main returns so the file appender flushes
    let _guard = telemetry::init_logging(&cli.log_level, cli.json_logs, cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Detect { path } => detect(&path)?,
        Commands::Setup => {
            let mut manager = manager_from(&load_config(cli.config.as_ref()).await?)?;
            let outcome = manager.initial_sync().await?;
            print_outcome("Initial sync", &outcome);
        }
        Commands::Down => {
            let mut manager = manager_from(&load_config(cli.config.as_ref()).await?)?;
            let outcome = manager.incremental_sync_down().await?;
            print_outcome("Sync-down", &outcome);
        }
        Commands::Up => {
            let mut manager = manager_from(&load_config(cli.config.as_ref()).await?)?;
            let outcome = manager.incremental_sync_up().await?;
            print_outcome("Sync-up", &outcome);
        }
        Commands::Preview { direction, json } => {
            let mut manager = manager_from(&load_config(cli.config.as_ref()).await?)?;
            preview(&mut manager, direction, json).await?
        }
        Commands::Status { json } => status(&load_config(cli.config.as_ref()).await?, json).await?,
        Commands::Run { step, command } => {
            let config = load_config(cli.config.as_ref()).await?;
            return run(&config, &step, &command).await.map(ExitCode::from);
        }
        Commands::Config { action } => match action {
            ConfigActions::Show => show_config(cli.config.as_ref()).await?,
            ConfigActions::Generate { network, output } => generate_config(network, output.as_ref()).await?,
        },
    }

    Ok(ExitCode::SUCCESS)
}

async fn load_config(config_path: Option<&PathBuf>) -> Result<SmartSyncConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {}", path.display());
        Ok(SmartSyncConfig::load(path).await?)
    } else {
        Ok(SmartSyncConfig::from_env()?)
    }
}

fn manager_from(config: &SmartSyncConfig) -> Result<SmartSyncManager> {
    if !config.enabled {
        bail!("Smart Sync is not enabled (set SMART_SYNC_ENABLED=true or pass --config)");
    }
    Ok(SmartSyncManager::from_config(config)?)
}

fn detect(path: &str) -> Result<()> {
    let os = HostOs::current();
    let detected = scenario::detect(os, path);
    info!(?os, ?detected, "Classified project path");

    if detected.needs_smart_sync() {
        let local_root = scenario::default_local_root(&scenario::project_name(Path::new(path)));
        println!("🌐 {} is a network location: Smart Sync recommended", path);
        println!("   Local staging root: {}", local_root.display());
    } else {
        println!("💻 {} can be used directly: Smart Sync not needed", path);
    }
    Ok(())
}

fn print_outcome(label: &str, outcome: &SyncOutcome) {
    if outcome.has_changes() {
        println!("✅ {}: {}", label, outcome.metrics.summary());
    } else {
        println!("✅ {}: no changes", label);
    }
    for message in &outcome.metrics.errors {
        println!("⚠️  {}", message);
    }
}

async fn preview(manager: &mut SmartSyncManager, direction: SyncDirection, json: bool) -> Result<()> {
    let plan = manager.preview(direction).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("✅ Nothing to sync {}", direction);
        return Ok(());
    }

    println!("📋 Sync-{} plan:", direction);
    for action in &plan.actions {
        match action {
            SyncAction::Copy { path, file_size } => println!("  + {} ({} bytes)", path.display(), file_size),
            SyncAction::Update { path, file_size } => println!("  ~ {} ({} bytes)", path.display(), file_size),
            SyncAction::Delete { path } => println!("  - {}", path.display()),
        }
    }
    println!(
        "   {} new, {} updated, {} deleted, {} bytes to transfer",
        plan.summary.copies, plan.summary.updates, plan.summary.deletes, plan.summary.total_bytes_to_transfer
    );
    if plan.summary.target_newer > 0 {
        println!("   {} file(s) newer on the target are left alone", plan.summary.target_newer);
    }
    Ok(())
}

async fn status(config: &SmartSyncConfig, json: bool) -> Result<()> {
    let (initialized, last_sync) = if config.enabled {
        let manager = manager_from(config)?;
        (manager.is_initialized().await, SyncLog::read(manager.local_root()).await?)
    } else {
        (false, None)
    };

    let report = StatusReport {
        enabled: config.enabled,
        network_root: config.network_root.clone(),
        local_root: config.local_root.clone(),
        initialized,
        last_sync,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.enabled {
        println!("⏸️  Smart Sync is disabled");
        return Ok(());
    }

    println!("📊 Smart Sync status");
    println!("   Network root: {}", report.network_root.display());
    println!("   Local root:   {}", report.local_root.display());
    println!("   Initialized:  {}", if report.initialized { "yes" } else { "no" });
    match &report.last_sync {
        Some(op) => println!(
            "   Last sync:    {} {} at {} ({} copied, {} updated, {} removed, {} failed)",
            op.operation,
            op.direction,
            op.last_sync.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
            op.files_copied,
            op.files_updated,
            op.files_removed,
            op.files_failed
        ),
        None => println!("   Last sync:    never"),
    }
    Ok(())
}

/// Run one step between the sync hooks and return the process exit code
async fn run(config: &SmartSyncConfig, step: &str, command: &[String]) -> Result<u8> {
    let Some((program, args)) = command.split_first() else {
        bail!("No command given for step '{}'", step);
    };

    let mut hooks = SyncHooks::from_config(config)?;
    let workdir = match hooks.manager() {
        Some(manager) => manager.local_root().to_path_buf(),
        None => std::env::current_dir().context("Failed to resolve working directory")?,
    };

    info!(step, program = %program, workdir = %workdir.display(), "Running step");

    // The interrupt covers both hooks and the step; dropping the step future kills the child
    let dir = workdir.as_path();
    let result = tokio::select! {
        result = run_step(&mut hooks, step, move || async move {
            match Command::new(program).args(args).current_dir(dir).kill_on_drop(true).status().await {
                Ok(status) => StepRun::Exited(status),
                Err(e) => StepRun::SpawnFailed(e),
            }
        }) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!(step, "Interrupted, stopping step");
            StepRun::Interrupted
        }
    };

    match result {
        StepRun::Exited(status) if status.success() => {
            println!("✅ Step '{}' completed", step);
            Ok(0)
        }
        StepRun::Exited(status) => {
            println!("❌ Step '{}' failed with {}", step, status);
            Ok(step_exit_code(&status))
        }
        StepRun::Interrupted => {
            println!("🛑 Step '{}' interrupted, syncing local results", step);
            tokio::select! {
                _ = hooks.final_sync() => {}
                Ok(()) = tokio::signal::ctrl_c() => {
                    error!(step, "Interrupted again, local results were not synced");
                }
            }
            Ok(INTERRUPTED_EXIT_CODE)
        }
        StepRun::SpawnFailed(e) => Err(e).with_context(|| format!("Failed to run '{}' for step '{}'", program, step)),
    }
}

/// Exit code to forward for a failed step; signals and out-of-range codes map to 1
fn step_exit_code(status: &ExitStatus) -> u8 {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

async fn show_config(config_path: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_path).await?;
    println!("{}", config.to_toml()?);
    Ok(())
}

async fn generate_config(network: Option<PathBuf>, output: Option<&PathBuf>) -> Result<()> {
    let config = match network {
        Some(network_root) => {
            let local_root = scenario::default_local_root(&scenario::project_name(&network_root));
            SmartSyncConfig::new(network_root, local_root)
        }
        None => SmartSyncConfig::default(),
    };

    match output {
        Some(path) => {
            config.save(path).await?;
            println!("✅ Configuration written to {}", path.display());
        }
        None => println!("{}", config.to_toml()?),
    }
    Ok(())
}
