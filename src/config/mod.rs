mod database;
mod env_provider;
mod logging;
mod secret_manager;
mod settings;

pub use database::{DatabaseConnections, migrate_audit_database, migrate_auth_database};
#[cfg(test)]
pub use env_provider::MockEnvironment;
pub use env_provider::{EnvironmentProvider, SystemEnvironment};
pub use logging::{LoggingConfig, LoggingError, init_logging, init_logging_with};
pub use secret_manager::{PASSWORD_PEPPER, JWT_SECRET, SecretError, SecretManager, TOKEN_HASH_SECRET};
pub use settings::{AppSettings, ConfigError, PasswordHashSettings};
