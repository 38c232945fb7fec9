use clap::Parser;

use council_auth::cli::{Cli, execute_command};
use council_auth::config::{AppSettings, init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging()?;

    let cli = Cli::parse();

    let settings = AppSettings::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    if let Err(e) = execute_command(cli, settings).await {
        tracing::error!("Command failed: {}", e);
        return Err(e);
    }

    Ok(())
}
