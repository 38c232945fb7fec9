use crate::config::{AppSettings, DatabaseConnections};

/// Run database migrations for the auth and audit databases
///
/// Connects to both databases and applies pending migrations without
/// building AppData, so no secrets are required.
pub async fn run_migrations(settings: &AppSettings) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Running database migrations...");

    let connections = DatabaseConnections::connect(settings).await?;

    tracing::info!("Migrating auth database...");
    crate::config::migrate_auth_database(&connections.auth).await?;

    tracing::info!("Migrating audit database...");
    crate::config::migrate_audit_database(&connections.audit).await?;

    tracing::info!("All migrations completed successfully");
    println!("Migrations applied");
    Ok(())
}
