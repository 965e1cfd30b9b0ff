//! retest CLI: incremental test selection for contract test suites.
//!
//! Provides `retest plan` to preview which test modules can be skipped,
//! `retest record` to store the outcome of a module run, `retest show` to
//! inspect the persisted cache, and `retest clean` to discard it.

#![warn(missing_docs)]

mod clean;
mod plan;
mod project;
mod record;
mod show;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// retest: skip tests whose inputs have not changed.
#[derive(Parser, Debug)]
#[command(name = "retest", version, about = "Incremental test selection")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `retest.toml` configuration file or project directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which test modules would run and which would be skipped.
    Plan(PlanArgs),
    /// Record the result of running one test module.
    Record(RecordArgs),
    /// Summarize the persisted cache.
    Show,
    /// Delete the persisted cache.
    Clean,
}

/// Arguments for the `retest plan` subcommand.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Plan for a run that collects coverage.
    #[arg(long)]
    pub coverage: bool,

    /// Output format for the plan.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `retest record` subcommand.
#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// Test module path, relative to the project root.
    pub module: String,

    /// The run collected coverage.
    #[arg(long)]
    pub coverage: bool,

    /// The module's chain state was reset after it ran.
    #[arg(long)]
    pub isolated: bool,

    /// Contracts the module touched (e.g., `--deps Token Vault`).
    #[arg(long, num_args = 1..)]
    pub deps: Vec<String>,

    /// Transactions the run produced.
    #[arg(long, num_args = 1..)]
    pub tx: Vec<String>,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Plan(ref args) => plan::run(args, &global),
        Command::Record(ref args) => record::run(args, &global),
        Command::Show => show::run(&global),
        Command::Clean => clean::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Default log level for the given flags; `RUST_LOG` takes precedence.
fn log_level(global: &GlobalArgs) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
