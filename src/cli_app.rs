//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;

use azure_cost_sweep::core::config::{Config, SweepOptions};
use azure_cost_sweep::core::errors::AcsError;
use azure_cost_sweep::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use azure_cost_sweep::logger::jsonl::JsonlConfig;
use azure_cost_sweep::report;
use azure_cost_sweep::scanner::run::{ScanReport, ScanRun};
use azure_cost_sweep::source::snapshot::SnapshotSource;

/// Azure cost sweep: find idle and wasteful resources, report cost per resource group.
#[derive(Debug, Parser)]
#[command(
    name = "acs",
    author,
    version,
    about = "Azure cost-hygiene sweep",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Scan the subscription, optionally delete unattached disks, write the report.
    Scan(ScanArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ScanArgs {
    /// JSON inventory snapshot to scan (overrides source.inventory_file).
    #[arg(long, value_name = "PATH")]
    inventory: Option<PathBuf>,
    /// Subscription id (overrides subscription.id and env).
    #[arg(long, value_name = "ID")]
    subscription: Option<String>,
    /// Delete unattached, unprotected disks. Irreversible.
    #[arg(long)]
    auto_delete: bool,
    /// Tag key that protects a disk when set to "yes".
    #[arg(long, value_name = "KEY")]
    protected_tag: Option<String>,
    /// Report output path (overrides report.path).
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Worker threads per scan pass.
    #[arg(long, value_name = "N")]
    parallelism: Option<usize>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// The run completed but some resources could not be scanned or deleted.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<AcsError> for CliError {
    fn from(value: AcsError) -> Self {
        if value.is_fatal() {
            Self::User(value.to_string())
        } else if matches!(value, AcsError::Serialization { .. } | AcsError::Report { .. }) {
            Self::Internal(value.to_string())
        } else {
            Self::Runtime(value.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let config = resolve_scan_config(cli, args)?;
    let mode = output_mode(cli);

    let inventory = args
        .inventory
        .clone()
        .or_else(|| config.source.inventory_file.clone())
        .ok_or_else(|| {
            CliError::User(
                "no inventory to scan: pass --inventory or set source.inventory_file".to_string(),
            )
        })?;
    let source = SnapshotSource::load(&inventory)?;

    let (logger, logger_join) = match spawn_logger(ActivityLoggerConfig::new(JsonlConfig::new(
        &config.paths.activity_log,
    ))) {
        Ok((handle, join)) => (Some(handle), Some(join)),
        Err(e) => {
            eprintln!("[ACS-LOG] activity log disabled: {e}");
            (None, None)
        }
    };

    let config_hash = config.stable_hash()?;
    if let Some(handle) = &logger {
        handle.send(ActivityEvent::RunStarted {
            subscription_id: config.subscription.id.clone(),
            auto_delete: config.cleanup.auto_delete,
            config_hash: config_hash.clone(),
        });
    }
    if cli.verbose {
        eprintln!(
            "[ACS-SCAN] subscription={} inventory={} config_hash={config_hash} activity_log={}",
            config.subscription.id,
            inventory.display(),
            config.paths.activity_log.display()
        );
    }

    let run = ScanRun::new(&source, SweepOptions::from_config(&config)).with_logger(logger.clone());
    let report = run.execute();
    let published = run.publish(&report, None);

    stop_logger(logger, logger_join);
    let report_path = published?;

    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                print_human_report(&report, !cli.no_color && io::stdout().is_terminal())?;
                println!("Report written to {}", report_path.display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "scan",
                "report_path": report_path.to_string_lossy(),
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }

    let summary = &report.summary;
    if summary.errors > 0 {
        return Err(CliError::Partial(format!(
            "{} resource(s) could not be scanned or deleted; see the report for details",
            summary.errors
        )));
    }
    Ok(())
}

fn resolve_scan_config(cli: &Cli, args: &ScanArgs) -> Result<Config, CliError> {
    let mut config = Config::load_unvalidated(cli.config.as_deref())?;
    if let Some(subscription) = &args.subscription {
        config.subscription.id = subscription.trim().to_string();
    }
    if args.auto_delete {
        config.cleanup.auto_delete = true;
    }
    if let Some(tag) = &args.protected_tag {
        config.cleanup.protected_tag = tag.trim().to_string();
    }
    if let Some(report) = &args.report {
        config.report.path.clone_from(report);
    }
    if let Some(parallelism) = args.parallelism {
        config.scanner.parallelism = parallelism;
    }
    config.validate()?;
    Ok(config)
}

fn stop_logger(
    logger: Option<ActivityLoggerHandle>,
    join: Option<std::thread::JoinHandle<()>>,
) {
    // Drop counts are written to the log itself as `log_dropped` entries.
    if let Some(handle) = logger {
        handle.shutdown();
    }
    if let Some(join) = join
        && join.join().is_err()
    {
        eprintln!("[ACS-LOG] logger thread panicked");
    }
}

fn print_human_report(report: &ScanReport, use_colors: bool) -> Result<(), CliError> {
    let mut rendered = String::new();
    report::generate_console(report, use_colors, &mut rendered)
        .map_err(|e| CliError::Internal(e.to_string()))?;
    let mut stdout = io::stdout().lock();
    write!(stdout, "{rendered}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load_unvalidated(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Subscription: {}", config.subscription.id);
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// output helpers
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("ACS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
