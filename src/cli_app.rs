//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::control;
use serde_json::{Value, json};
use thiserror::Error;

use pixelpress::catalog::{CATALOG, ContextId};
use pixelpress::core::config::Config;
use pixelpress::present::format_size;
use pixelpress::quota::QuotaLedger;
use pixelpress::session::{OptimizeOutcome, RunOutcome, optimize_once};
use pixelpress::validate::RejectReason;

/// PixelPress — context-aware image optimization from the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "pxp",
    author,
    version,
    about = "PixelPress - Image Optimization Wizard",
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
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Optimize an image: interactive wizard, or one shot with --yes.
    Optimize(OptimizeArgs),
    /// List the available usage contexts.
    Contexts,
    /// Show today's usage against the daily limit.
    Quota,
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Show version and build metadata.
    Version,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct OptimizeArgs {
    /// Image file to optimize. Optional in the wizard, required with --yes.
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,
    /// Usage context: ecommerce, instagram, web, or general.
    #[arg(long, value_name = "CONTEXT")]
    context: Option<ContextId>,
    /// Run the whole pipeline without the interactive wizard.
    #[arg(long)]
    yes: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run; defaults to `path`.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the effective config file path.
    Path,
    /// Print the effective configuration as TOML.
    Show,
    /// Check the configuration and print its hash.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum, value_name = "SHELL")]
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
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
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
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Optimize(args) => run_optimize(cli, args),
        Command::Contexts => run_contexts(cli),
        Command::Quota => run_quota(cli),
        Command::Config(args) => run_config(cli, args),
        Command::Version => emit_version(cli),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::Runtime(e.to_string()))
}

fn run_optimize(cli: &Cli, args: &OptimizeArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;

    if !args.yes {
        return run_wizard(&config, args);
    }
    let (Some(path), Some(context)) = (args.path.as_deref(), args.context) else {
        return Err(CliError::User(
            "--yes needs a PATH argument and --context".to_string(),
        ));
    };

    let mode = output_mode(cli);
    let announce = mode == OutputMode::Human && !cli.quiet;

    let outcome = optimize_once(&config, path, context, |stage| {
        if announce {
            println!("{}", stage.label());
        }
    })
    .map_err(|e| CliError::Runtime(e.to_string()))?;

    match outcome {
        RunOutcome::Completed(done) => emit_outcome(cli, mode, &config, &done),
        RunOutcome::Refused(reason) => {
            emit_refusal(mode, &reason)?;
            Err(CliError::User(format!(
                "optimization refused ({})",
                reason.name()
            )))
        }
    }
}

#[cfg(feature = "tui")]
fn run_wizard(config: &Config, args: &OptimizeArgs) -> Result<(), CliError> {
    pixelpress::tui::run(config, args.path.as_deref(), args.context)
        .map_err(|e| CliError::Runtime(e.to_string()))
}

#[cfg(not(feature = "tui"))]
fn run_wizard(_config: &Config, _args: &OptimizeArgs) -> Result<(), CliError> {
    Err(CliError::User(
        "this build has no interactive wizard; rerun with --yes, a PATH, and --context"
            .to_string(),
    ))
}

fn emit_outcome(
    cli: &Cli,
    mode: OutputMode,
    config: &Config,
    done: &OptimizeOutcome,
) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            if !cli.quiet {
                println!();
            }
            println!("Optimization complete!");
            println!("  Original   {:>10}", format_size(done.original_size));
            println!(
                "  Optimized  {:>10} · {}",
                format_size(done.optimized_size),
                done.format_label
            );
            println!("  Savings    {}% smaller", done.ratio_percent);
            println!("  Quality    {}% retained", done.quality_percent);
            println!("  Saved to {}", done.output_path.display());
            println!(
                "  Usage: {}/{} images today",
                done.used_today, config.limits.daily_quota
            );
            if cli.verbose {
                println!("  Source: {}", done.source.display());
                println!("  Context: {}", done.context.entry().label);
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "optimize",
                "status": "completed",
                "source": done.source.to_string_lossy(),
                "context": done.context.as_str(),
                "original_bytes": done.original_size,
                "optimized_bytes": done.optimized_size,
                "ratio_percent": done.ratio_percent,
                "quality_percent": done.quality_percent,
                "format": done.format_label,
                "output": done.output_path.to_string_lossy(),
                "used_today": done.used_today,
                "daily_quota": config.limits.daily_quota,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn emit_refusal(mode: OutputMode, reason: &RejectReason) -> Result<(), CliError> {
    match mode {
        OutputMode::Human => {
            eprintln!("{}: {}", reason.title(), reason.description());
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "optimize",
                "status": "refused",
                "reason": reason.name(),
                "title": reason.title(),
                "description": reason.description(),
                "details": serde_json::to_value(reason)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_contexts(cli: &Cli) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => {
            println!("Available contexts:");
            println!();
            for (index, entry) in CATALOG.iter().enumerate() {
                println!("  {}. {:<11} {}", index + 1, entry.label, entry.description);
                if !cli.quiet {
                    println!("     {}", entry.hints.join(" · "));
                }
            }
        }
        OutputMode::Json => {
            for entry in &CATALOG {
                write_json_line(&serde_json::to_value(entry)?)?;
            }
        }
    }
    Ok(())
}

fn run_quota(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let ledger = QuotaLedger::new(config.paths.ledger_file.clone());
    let used = ledger.used_today();
    let limit = config.limits.daily_quota;
    let remaining = limit.saturating_sub(used);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{used}/{limit} images today");
            if remaining == 0 {
                println!("Daily limit reached. The counter resets at midnight UTC.");
            } else {
                println!("{remaining} remaining. The counter resets at midnight UTC.");
            }
            if cli.verbose {
                println!("Ledger: {}", ledger.path().display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "quota",
                "used_today": used,
                "daily_quota": limit,
                "remaining": remaining,
                "ledger": ledger.path().to_string_lossy(),
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

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
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config
                    .stable_hash()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
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

fn emit_version(cli: &Cli) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("pxp {version}");
            if cli.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "pxp",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PXP_OUTPUT_FORMAT").ok();
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
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}
