use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::config::{AppSettings, DatabaseConnections, SecretManager};
use crate::errors::InternalError;
use crate::providers::{CryptoProvider, LogNotifier, Notifier, PasswordPolicyProvider, TokenProvider};
use crate::stores::{AuditStore, CredentialStore, PermissionRequestStore};

/// Centralized application data following the main-owned stores pattern
///
/// All dependencies are created once at startup and shared across coordinators.
///
/// # Architecture
///
/// ```text
/// main.rs
///   ↓
/// AppData::init(settings, connections)
///   ↓ creates once
///   ├─ secret_manager (Arc<SecretManager>)
///   ├─ audit_store / credential_store / permission_request_store
///   ├─ crypto / tokens / password_policy
///   ├─ audit_logger (Arc<AuditLogger>)
///   └─ notifier (Arc<dyn Notifier>)
///   ↓ wrapped in Arc<AppData>
///   ├─ AuthCoordinator::new(app_data)
///   ├─ PermissionCoordinator::new(app_data)
///   └─ AdminCoordinator::new(app_data)
/// ```
pub struct AppData {
    pub settings: AppSettings,
    pub connections: DatabaseConnections,
    pub secret_manager: Arc<SecretManager>,
    pub audit_store: Arc<AuditStore>,
    pub credential_store: Arc<CredentialStore>,
    pub permission_request_store: Arc<PermissionRequestStore>,
    pub crypto: Arc<CryptoProvider>,
    pub tokens: Arc<TokenProvider>,
    pub password_policy: Arc<PasswordPolicyProvider>,
    pub audit_logger: Arc<AuditLogger>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppData {
    /// Initialize all application data from the process environment
    ///
    /// Database connections should be connected and migrated before calling this.
    /// Outbound notifications go to the log.
    ///
    /// # Errors
    ///
    /// Returns `InternalError` when secret manager initialization fails
    pub async fn init(
        settings: AppSettings,
        connections: DatabaseConnections,
    ) -> Result<Self, InternalError> {
        tracing::info!("Initializing AppData...");

        tracing::debug!("Initializing secret manager...");
        let secret_manager = SecretManager::init().map_err(|e| {
            InternalError::parse("secret_manager", format!("Secret manager init failed: {}", e))
        })?;
        tracing::debug!("Secret manager initialized: {}", secret_manager);

        if settings.smtp_url().is_some() {
            tracing::warn!("SMTP_URL is set but delivery is delegated; notifications are logged");
        }
        let notifier: Arc<dyn Notifier> =
            Arc::new(LogNotifier::new(settings.app_base_url(), settings.mail_from()));

        let app_data = Self::build(settings, connections, secret_manager, notifier)?;

        tracing::info!("AppData initialization complete");
        Ok(app_data)
    }

    /// Assemble AppData from already-loaded parts
    ///
    /// Used by `init` and by tests that inject secrets and a recording notifier.
    pub fn build(
        settings: AppSettings,
        connections: DatabaseConnections,
        secret_manager: SecretManager,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, InternalError> {
        tracing::debug!("Creating stores...");
        let audit_store = Arc::new(AuditStore::new(connections.audit.clone()));
        let credential_store = Arc::new(CredentialStore::new(connections.auth.clone()));
        let permission_request_store =
            Arc::new(PermissionRequestStore::new(connections.auth.clone()));
        tracing::debug!("Stores created");

        let crypto = Arc::new(CryptoProvider::new(&secret_manager, settings.password_hash())?);
        let tokens = Arc::new(TokenProvider::new(&secret_manager, settings.token_ttl_hours()));
        let audit_logger = Arc::new(AuditLogger::new(audit_store.clone()));

        Ok(Self {
            settings,
            connections,
            secret_manager: Arc::new(secret_manager),
            audit_store,
            credential_store,
            permission_request_store,
            crypto,
            tokens,
            password_policy: Arc::new(PasswordPolicyProvider::new()),
            audit_logger,
            notifier,
        })
    }
}
