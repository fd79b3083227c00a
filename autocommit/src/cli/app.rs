use autocommit_core::WatchMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "autocommit",
    version,
    about = "Autocommit - turn working-tree activity into well-timed git commits",
    long_about = "Watch a git working tree and commit settled edits after a cancellable countdown"
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository root
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub repo: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the working tree and commit automatically
    #[command(about = "Watch the working tree and commit when activity settles")]
    Watch(WatchArgs),

    /// Commit everything now
    #[command(about = "Stage, commit and optionally push all changes immediately")]
    Commit(CommitArgs),

    /// Show repository and session status
    #[command(about = "Show pending changes and the last recorded session state")]
    Status(StatusArgs),

    /// Write a default configuration file
    #[command(about = "Create .autocommit/config.toml with default settings")]
    Init(InitArgs),
}

/// CLI spelling of [`WatchMode`]
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Periodic,
    Intelligent,
}

impl From<ModeArg> for WatchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Periodic => WatchMode::Periodic,
            ModeArg::Intelligent => WatchMode::Intelligent,
        }
    }
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Scheduling mode, overriding the configuration file
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Push after every commit
    #[arg(long)]
    pub push: bool,

    /// Countdown before each commit in seconds (0 commits immediately)
    #[arg(short, long)]
    pub buffer: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct CommitArgs {
    /// Commit message; generated from the changes when omitted
    #[arg(short, long)]
    pub message: Option<String>,

    /// Push after committing
    #[arg(long)]
    pub push: bool,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the recorded session state as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(short, long)]
    pub force: bool,
}
