use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let context = cli::commands::CommandContext::load(cli.repo, cli.config)?;

    match cli.command {
        Commands::Init(args) => {
            debug!("Init command: {:?}", args);
            cli::commands::init::execute(&context, args)?;
        }
        Commands::Watch(args) => {
            debug!("Watch command: {:?}", args);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::watch::execute(context, args))?;
        }
        Commands::Commit(args) => {
            debug!("Commit command: {:?}", args);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::commit::execute(context, args))?;
        }
        Commands::Status(args) => {
            debug!("Status command: {:?}", args);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::commands::status::execute(context, args))?;
        }
    }

    Ok(())
}
