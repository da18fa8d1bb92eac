//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use suite_guard::core::config::{ColorChoice, HarnessConfig, Modifiers};
use suite_guard::core::errors::GuardError;
use suite_guard::harness::result_log::{TallyReport, TapLog};
use suite_guard::harness::suite::Suite;
use suite_guard::script::{Script, ScriptOutcome};

/// Suite Guard: replay suite scripts under die/bail failure policies.
#[derive(Debug, Parser)]
#[command(
    name = "sguard",
    author,
    version,
    about = "Suite Guard - TAP suite replay with die/bail on failure",
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
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Replay a suite script and emit TAP on stdout.
    Run(RunArgs),
    /// Show the effective configuration.
    Config(ConfigArgs),
    /// Generate shell completion scripts.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Script to replay.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,
    /// Abort the suite on the assertion following a failure.
    #[arg(long)]
    die: bool,
    /// Terminate with "Bail out!" on the assertion following a failure.
    #[arg(long)]
    bail: bool,
    /// Postpone the plan until `done` or end of run.
    #[arg(long)]
    defer_plan: bool,
    /// Append harness events to this JSONL file.
    #[arg(long, value_name = "PATH")]
    event_log: Option<PathBuf>,
    /// Trailing modifier words (`die`, `bail`, `defer_plan`).
    #[arg(value_name = "MODIFIER")]
    modifiers: Vec<String>,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective config after env overrides.
    Show,
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
///
/// Suite results own statuses 0, 1..=254 and 255, so CLI failures are
/// reported on stderr and distinguished by message rather than status.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Config, script or harness error.
    #[error(transparent)]
    Guard(#[from] GuardError),
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
            Self::User(_) | Self::Guard(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch the parsed command line and return the process exit status.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_script(cli, args),
        Command::Config(args) => run_config(cli, args).map(|()| 0),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(0)
        }
    }
}

fn run_script(cli: &Cli, args: &RunArgs) -> Result<i32, CliError> {
    let config = resolve_run_config(cli, args)?;
    apply_color(cli, config.color);

    let script = Script::load(&args.script)?;
    let mut suite = Suite::from_config(TapLog::stdout(), &config)?;
    let outcome = script.run(&mut suite)?;
    drop(suite);

    let code = outcome.exit_code();
    match output_mode(cli) {
        OutputMode::Human => eprintln!("{}", summary_line(&outcome, code)),
        OutputMode::Json => {
            let payload = json!({
                "command": "run",
                "script": args.script.to_string_lossy(),
                "report": serde_json::to_value(&outcome.report)?,
                "exit_requested": outcome.exit_requested,
                "stopped_by": outcome.stopped_by,
                "exit_code": code,
            });
            write_json_line_to(&mut io::stderr().lock(), &payload)?;
        }
    }
    Ok(code)
}

fn resolve_run_config(cli: &Cli, args: &RunArgs) -> Result<HarnessConfig, CliError> {
    let modifiers = Modifiers::parse(args.modifiers.iter().cloned());
    if !modifiers.remaining.is_empty() {
        return Err(CliError::User(format!(
            "unknown modifier(s): {}",
            modifiers.remaining.join(" ")
        )));
    }

    let mut config = HarnessConfig::load(cli.config.as_deref())?.with_modifiers(&modifiers);
    config.die_on_fail |= args.die;
    config.bail_on_fail |= args.bail;
    config.defer_plan |= args.defer_plan;
    if let Some(path) = &args.event_log {
        config.event_log = Some(path.clone());
    }
    Ok(config)
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(HarnessConfig::default_path);
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
                    write_json_line_to(&mut io::stdout().lock(), &payload)?;
                }
            }
            Ok(())
        }
        None | Some(ConfigCommand::Show) => {
            let config = HarnessConfig::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => print!("{}", config.to_toml()?),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                        "failure_policy": config.failure_policy(),
                    });
                    write_json_line_to(&mut io::stdout().lock(), &payload)?;
                }
            }
            Ok(())
        }
    }
}

fn apply_color(cli: &Cli, choice: ColorChoice) {
    if cli.no_color {
        return;
    }
    match choice {
        ColorChoice::Always => control::set_override(true),
        ColorChoice::Never => control::set_override(false),
        ColorChoice::Auto => {
            if !io::stderr().is_terminal() {
                control::set_override(false);
            }
        }
    }
}

fn summary_line(outcome: &ScriptOutcome, code: i32) -> String {
    let report = &outcome.report;
    let counts = tally_text(report);
    let verdict = if report.aborted {
        "STOPPED".red().bold()
    } else if report.failed > 0 {
        "FAIL".red().bold()
    } else if report.plan_mismatch {
        "PLAN".yellow().bold()
    } else {
        "PASS".green().bold()
    };
    format!("sguard: {verdict} {counts} (exit {code})")
}

fn tally_text(report: &TallyReport) -> String {
    let planned = report
        .expected
        .map_or_else(|| "no plan".to_string(), |n| format!("{n} planned"));
    format!(
        "{} run, {} failed, {planned}",
        report.executed, report.failed
    )
}

fn write_json_line_to(out: &mut dyn Write, payload: &Value) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, payload)?;
    writeln!(out)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}
