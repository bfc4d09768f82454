//! The uartbench command-line interface. Runs the UART verification suites.
//!
//! Provides `uartbench run` for running the scenario cases of one or every
//! device variant, and `uartbench list` for showing which cases exist.

#![warn(missing_docs)]

mod list;
mod logging;
mod project;
mod run;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use uartbench_config::VariantKind;

/// uartbench: scenario-driven verification of UART devices.
#[derive(Parser, Debug)]
#[command(name = "uartbench", version, about = "UART verification suite runner")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `uartbench.toml` file or the directory holding one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run scenario cases.
    Run(RunArgs),
    /// List scenario cases without running them.
    List(ListArgs),
}

/// Arguments for the `uartbench run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Specific case name to run, e.g. `reset_rx[1/3]` (optional).
    pub name: Option<String>,

    /// Device variant; every variant runs when omitted.
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Override the device clock (e.g. "10MHz").
    #[arg(long, requires = "variant")]
    pub clock: Option<String>,

    /// Override the baud rate.
    #[arg(long, requires = "variant")]
    pub baud: Option<u64>,

    /// Seed for the random gaps; drawn at random when neither this nor the
    /// configuration sets one.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Bound on each wait for the device, in simulated time (e.g. "50ms").
    #[arg(long)]
    pub timeout: Option<String>,

    /// Substring filter for case names.
    #[arg(long)]
    pub filter: Option<String>,

    /// Output format for the final report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `uartbench list` subcommand.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Device variant; every variant is listed when omitted.
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,
}

/// Device variant selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    /// The bare UART core.
    Uart,
    /// The board-level wrapper.
    Top,
}

impl VariantArg {
    /// The variants this selection covers.
    pub fn kinds(selection: Option<VariantArg>) -> Vec<VariantKind> {
        match selection {
            Some(VariantArg::Uart) => vec![VariantKind::Uart],
            Some(VariantArg::Top) => vec![VariantKind::Top],
            None => VariantKind::ALL.to_vec(),
        }
    }
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON on stdout.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file or directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    logging::init(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::List(ref args) => list::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
