//! pybundle CLI
//!
//! Entry point for the `pybundle` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use pybundle::config::{
    project_config_path, user_config_path, ConfigError, EffectiveConfig,
};
use pybundle::pyenv;
use pybundle::report::{BuildReport, FailureKind, Status, EXIT_CODE_CANCELLED};
use pybundle::signal::SignalHandler;
use pybundle::{
    launch_plan, validate, BundleOptions, CommandSpec, DataEntry, ExplainOutput, JobEvent,
    OutputSource, Platform, Supervisor,
};

#[derive(Parser)]
#[command(name = "pybundle")]
#[command(about = "Bundle Python applications with PyInstaller", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a PyInstaller build under supervision
    Build {
        #[command(flatten)]
        options: OptionArgs,

        /// Write the build report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output the build report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate options and interpreter without building
    Check {
        #[command(flatten)]
        options: OptionArgs,
    },

    /// Print the assembled PyInstaller command without executing
    Explain {
        #[command(flatten)]
        options: OptionArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Interpreter management commands
    Interpreters {
        #[command(subcommand)]
        action: InterpretersCommands,
    },
}

#[derive(Subcommand)]
enum InterpretersCommands {
    /// List candidate interpreters for this project
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Probe an interpreter for version, kind, and packages
    Probe {
        /// Interpreter executable
        python: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct OptionArgs {
    /// Python entry script
    script: PathBuf,

    /// Application icon
    #[arg(long)]
    icon: Option<PathBuf>,

    /// Bundle a data file or directory (repeatable)
    #[arg(long = "add-data", value_name = "SOURCE:DEST")]
    add_data: Vec<String>,

    /// Bundle a binary file (repeatable)
    #[arg(long = "add-binary", value_name = "SOURCE:DEST")]
    add_binary: Vec<String>,

    /// Module PyInstaller's analysis cannot see (repeatable)
    #[arg(long = "hidden-import", value_name = "MODULE")]
    hidden_imports: Vec<String>,

    /// Output name (defaults to the script name)
    #[arg(long)]
    name: Option<String>,

    /// Bundle into a single executable file
    #[arg(long, conflicts_with = "onedir")]
    onefile: bool,

    /// Bundle into a directory containing the executable (default)
    #[arg(long)]
    onedir: bool,

    /// Hide the console window
    #[arg(long, conflicts_with = "console")]
    windowed: bool,

    /// Open a console window for stdio (default)
    #[arg(long)]
    console: bool,

    /// Clean PyInstaller's cache before building
    #[arg(long)]
    clean: bool,

    /// Python interpreter to run PyInstaller with
    #[arg(long)]
    python: Option<PathBuf>,

    /// Path to project config file (default: pybundle.toml next to the script)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Build {
            options,
            report,
            json,
        } => run_build(&options, report.as_deref(), json),
        Commands::Check { options } => run_check(&options),
        Commands::Explain { options, json } => run_explain(&options, json),
        Commands::Interpreters { action } => match action {
            InterpretersCommands::List { json } => run_interpreters_list(json),
            InterpretersCommands::Probe { python, json } => run_interpreters_probe(&python, json),
        },
    };

    process::exit(code);
}

fn run_build(args: &OptionArgs, report_path: Option<&Path>, json: bool) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return FailureKind::Options.exit_code();
        }
    };

    let options = match build_options(args, &config) {
        Ok(options) => options,
        Err(message) => return finish_rejected(FailureKind::Options, &message, report_path, json),
    };

    let validation = validate(&options, Platform::current());
    if !validation.accepted {
        let message = format!(
            "options rejected: {}",
            validation.issue_codes().join(", ")
        );
        return finish_rejected(FailureKind::Options, &message, report_path, json);
    }

    let python = PathBuf::from(config.python());
    let timeout = config.probe_timeout();
    if !pyenv::validate(&python, timeout) {
        let message = format!(
            "{} is not a working Python interpreter",
            python.display()
        );
        return finish_rejected(FailureKind::Interpreter, &message, report_path, json);
    }
    if !pyenv::module_installed(&python, "PyInstaller", timeout) {
        let message = format!("PyInstaller is not installed in {}", python.display());
        return finish_rejected(FailureKind::Interpreter, &message, report_path, json);
    }

    let plan = launch_plan(&options, &python);
    eprintln!("[pybundle] {}", plan.render());

    let mut command_line = vec![plan.program.clone()];
    command_line.extend(plan.args.iter().cloned());

    let spec = CommandSpec::new(plan.program, plan.working_dir).args(plan.args);

    let handler = SignalHandler::new();
    if let Err(e) = handler.install() {
        eprintln!("Warning: could not install signal handler: {}", e);
    }
    let signals = handler.state();

    let supervisor = Supervisor::with_grace_period(config.grace_period());
    let (events_tx, events_rx) = mpsc::channel();
    if let Err(e) = supervisor.start(spec, events_tx) {
        return finish_rejected(FailureKind::Launch, &e.to_string(), report_path, json);
    }

    let mut cancel_sent = false;
    let terminal = loop {
        if signals.is_immediate_exit() {
            return EXIT_CODE_CANCELLED;
        }
        if signals.is_cancel_requested() && !cancel_sent {
            supervisor.cancel();
            cancel_sent = true;
        }

        match events_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(JobEvent::Line(line)) => {
                // with --json, stdout carries only the report
                if json {
                    eprintln!("{}", line.text);
                } else {
                    match line.source {
                        OutputSource::Stdout => println!("{}", line.text),
                        OutputSource::Stderr => eprintln!("{}", line.text),
                    }
                }
            }
            Ok(JobEvent::Terminated(terminal)) => break terminal,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                eprintln!("Error: build ended without a terminal event");
                return FailureKind::Launch.exit_code();
            }
        }
    };

    finish(
        BuildReport::from_terminal(command_line, &terminal),
        report_path,
        json,
    )
}

fn run_check(args: &OptionArgs) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return FailureKind::Options.exit_code();
        }
    };

    let options = match build_options(args, &config) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Options: REJECTED");
            eprintln!("  - {}", message);
            return FailureKind::Options.exit_code();
        }
    };

    let validation = validate(&options, Platform::current());
    if !validation.accepted {
        println!("Options: REJECTED");
        for code in validation.issue_codes() {
            println!("  - {}", code);
        }
        return FailureKind::Options.exit_code();
    }
    println!("Options: OK");

    let python = PathBuf::from(config.python());
    let timeout = config.probe_timeout();
    match pyenv::probe(&python, timeout) {
        Ok(env) => {
            println!(
                "Interpreter: {} (Python {}, {})",
                env.executable.display(),
                env.version,
                env.kind
            );
            if pyenv::module_installed(&python, "PyInstaller", timeout) {
                println!("PyInstaller: installed");
                0
            } else {
                println!("PyInstaller: NOT installed");
                FailureKind::Interpreter.exit_code()
            }
        }
        Err(e) => {
            eprintln!("Interpreter: {}", e);
            FailureKind::Interpreter.exit_code()
        }
    }
}

fn run_explain(args: &OptionArgs, json: bool) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return FailureKind::Options.exit_code();
        }
    };

    let options = match build_options(args, &config) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            return FailureKind::Options.exit_code();
        }
    };

    let python = PathBuf::from(config.python());
    let output = ExplainOutput::from_options(&options, Platform::current(), Some(&python));

    if json {
        match output.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return 1;
            }
        }
    } else {
        println!("{}", output.to_human());
    }

    if output.accepted {
        0
    } else {
        FailureKind::Options.exit_code()
    }
}

fn run_interpreters_list(json: bool) -> i32 {
    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match load_config_for_dir(&project_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return 1;
        }
    };
    let timeout = config.probe_timeout();

    let candidates = pyenv::discover(&project_dir);

    if json {
        let entries: Vec<Value> = candidates
            .iter()
            .map(|path| {
                json!({
                    "path": path.display().to_string(),
                    "valid": pyenv::validate(path, timeout),
                    "kind": pyenv::infer_kind(path).to_string(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return 1;
            }
        }
    } else if candidates.is_empty() {
        println!("No Python interpreters found");
    } else {
        for path in &candidates {
            let kind = pyenv::infer_kind(path);
            let note = if pyenv::validate(path, timeout) {
                ""
            } else {
                ", not runnable"
            };
            println!("{}  [{}{}]", path.display(), kind, note);
        }
    }

    0
}

fn run_interpreters_probe(python: &Path, json: bool) -> i32 {
    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match load_config_for_dir(&project_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return 1;
        }
    };

    match pyenv::probe(python, config.probe_timeout()) {
        Ok(env) => {
            if json {
                match serde_json::to_string_pretty(&env) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error serializing output: {}", e);
                        return 1;
                    }
                }
            } else {
                println!("Python {}", env.version);
                println!("Kind: {}", env.kind);
                println!("Packages: {}", env.packages.len());
                println!(
                    "PyInstaller: {}",
                    if env.has_pyinstaller() {
                        "installed"
                    } else {
                        "not installed"
                    }
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Probe failed: {}", e);
            FailureKind::Interpreter.exit_code()
        }
    }
}

/// Load the effective config for a build: user config, project config next
/// to the script (or the explicit --config path), then CLI flags.
fn load_config(args: &OptionArgs) -> Result<EffectiveConfig, ConfigError> {
    let project_dir = match args.script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let project = args
        .config
        .clone()
        .unwrap_or_else(|| project_config_path(&project_dir));
    let user = user_config_path();
    EffectiveConfig::build(user.as_deref(), Some(&project), cli_overrides(args))
}

/// Load the effective config for a directory (no option flags involved)
fn load_config_for_dir(dir: &Path) -> Result<EffectiveConfig, ConfigError> {
    let user = user_config_path();
    EffectiveConfig::build(user.as_deref(), Some(&project_config_path(dir)), None)
}

/// CLI flags as the highest-precedence config layer
fn cli_overrides(args: &OptionArgs) -> Option<Value> {
    let mut overrides = serde_json::Map::new();

    if let Some(ref python) = args.python {
        overrides.insert("python".to_string(), json!(python.display().to_string()));
    }

    let mut bundle = serde_json::Map::new();
    if args.onefile {
        bundle.insert("mode".to_string(), json!("onefile"));
    }
    if args.onedir {
        bundle.insert("mode".to_string(), json!("onedir"));
    }
    if args.windowed {
        bundle.insert("console".to_string(), json!("windowed"));
    }
    if args.console {
        bundle.insert("console".to_string(), json!("console"));
    }
    if args.clean {
        bundle.insert("clean".to_string(), json!(true));
    }
    if !bundle.is_empty() {
        overrides.insert("bundle".to_string(), Value::Object(bundle));
    }

    if overrides.is_empty() {
        None
    } else {
        Some(Value::Object(overrides))
    }
}

/// Combine CLI options and config into the bundle options
fn build_options(args: &OptionArgs, config: &EffectiveConfig) -> Result<BundleOptions, String> {
    let mut options = BundleOptions::new(&args.script);
    options.icon = args.icon.clone();
    options.name = args.name.clone();
    options.hidden_imports = args.hidden_imports.clone();
    options.bundle_mode = config.bundle_mode();
    options.console_mode = config.console_mode();
    options.clean = config.clean();

    for spec in &args.add_data {
        options
            .add_data
            .push(spec.parse::<DataEntry>().map_err(|e| e.to_string())?);
    }
    for spec in &args.add_binary {
        options
            .add_binary
            .push(spec.parse::<DataEntry>().map_err(|e| e.to_string())?);
    }

    Ok(options)
}

fn finish_rejected(
    kind: FailureKind,
    message: &str,
    report_path: Option<&Path>,
    json: bool,
) -> i32 {
    finish(BuildReport::rejected(kind, message), report_path, json)
}

/// Emit the report and return the stable exit code
fn finish(report: BuildReport, report_path: Option<&Path>, json: bool) -> i32 {
    if let Some(path) = report_path {
        if let Err(e) = report.write_to_file(path) {
            eprintln!(
                "Warning: could not write report to {}: {}",
                path.display(),
                e
            );
        }
    }

    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Error serializing report: {}", e),
        }
    } else if report.status == Status::Success {
        eprintln!("[pybundle] {} ({} ms)", report.human_summary, report.duration_ms);
    } else {
        eprintln!("[pybundle] {}", report.human_summary);
    }

    report.exit_code
}
