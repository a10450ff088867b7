use clap::Parser;
use tracing_subscriber::EnvFilter;

use reelcore::cli::Cli;
use reelcore::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = cli.into_run_config()?;

    let orchestrator = Orchestrator::new(cfg);
    let output = orchestrator.run().await?;
    println!("{}", output.display());
    Ok(())
}
