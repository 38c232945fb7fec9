// CLI module for serving the API and administrative operations

pub mod migrate;
pub mod serve;
pub mod super_admin;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::app_data::AppData;
use crate::config::{AppSettings, DatabaseConnections};

/// Council auth backend
#[derive(Parser, Debug)]
#[command(name = "council-auth")]
#[command(about = "Council authentication and authorization backend", long_about = None)]
pub struct Cli {
    /// Defaults to `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run migrations and start the HTTP server
    Serve,

    /// Run pending migrations on both databases and exit
    Migrate,

    /// Create a verified SuperAdmin with a generated password
    CreateSuperAdmin {
        /// Login name for the new account
        #[arg(long)]
        username: String,

        /// Email address for the new account
        #[arg(long)]
        email: String,
    },
}

/// Execute CLI command
///
/// Routes the parsed command to its handler. Everything except `migrate`
/// needs the full AppData, so secrets are only required for those.
///
/// # Returns
/// * `Ok(())` - Command executed successfully
/// * `Err(...)` - Command execution failed
pub async fn execute_command(
    cli: Cli,
    settings: AppSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let command = cli.command.unwrap_or(Commands::Serve);

    if command == Commands::Migrate {
        migrate::run_migrations(&settings).await?;
        return Ok(());
    }

    let connections = DatabaseConnections::connect(&settings).await?;
    connections.migrate().await?;
    let app_data = Arc::new(AppData::init(settings, connections).await?);

    match command {
        Commands::Serve => serve::run_server(app_data).await?,
        Commands::CreateSuperAdmin { username, email } => {
            super_admin::create_super_admin(&app_data, &username, &email).await?;
        }
        Commands::Migrate => {}
    }

    Ok(())
}
