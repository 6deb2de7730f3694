//! CLI argument definitions for the launcher.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "Keep the program up to date and start it",
    long_about = "Check the release server for a newer version of the program, install it \
                  into its own versions/ directory and start it.\n\n\
                  Without a subcommand this behaves like `launcher run`."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Launcher base directory (default: next to the launcher executable).
    #[arg(long = "base-dir", value_name = "DIR", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Update if needed, then start the program.
    Run(RunArgs),

    /// Report whether an update is available without downloading it.
    Check,

    /// Install an available update without starting the program.
    Update(UpdateArgs),

    /// Show the latest server notice.
    Notice(NoticeArgs),

    /// Show the installed state and the versions on disk.
    Status,
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Install an available update without asking.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Stop after updating; do not start the program.
    #[arg(long = "no-launch")]
    pub no_launch: bool,

    /// Wait for the program to exit and return its exit code.
    #[arg(long = "wait")]
    pub wait: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Install without asking.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,
}

#[derive(Args)]
pub struct NoticeArgs {
    /// Do not show this notice again for a day.
    #[arg(long = "hide-today")]
    pub hide_today: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
