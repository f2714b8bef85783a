mod cli;
mod command;

use clap::Parser;
use cli::{Cli, Commands};
use slicefetch::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_with(cli.config)?;

    match cli.command {
        Commands::Get(args) => command::get(args, &config).await?,
    }

    Ok(())
}
