use clap::Parser;
use tracing_subscriber::EnvFilter;

use studysync::cli::{handlers, Cli, Commands};
use studysync::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?.with_backend_override(cli.backend.clone())?;
    let command = cli.command.unwrap_or(Commands::Dashboard);

    if matches!(command, Commands::Dashboard) {
        // The dashboard wires tracing into its own log strip.
        handlers::run_dashboard(config).await
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("studysync=info".parse().unwrap()),
            )
            .init();
        handlers::run_command(config, command).await
    }
}
