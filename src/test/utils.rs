// Test utilities shared across unit tests
// Only compiled when running tests

use std::sync::Arc;

use async_trait::async_trait;
use migration::{AuditMigrator, AuthMigrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

use crate::app_data::AppData;
use crate::config::{
    AppSettings, DatabaseConnections, MockEnvironment, PasswordHashSettings, SecretManager,
};
use crate::providers::{InMemoryNotifier, NotificationError, Notifier};
use crate::stores::NewUser;
use crate::types::db::user;
use crate::types::internal::auth::Claims;
use crate::types::internal::context::RequestContext;
use crate::types::internal::notification::Notification;
use crate::types::internal::Role;

/// Password used for accounts created by `create_user`
pub const TEST_PASSWORD: &str = "test-pass-2024";

/// Creates in-memory auth and audit databases with migrations applied
///
/// Returns (auth_db, audit_db)
pub async fn setup_test_dbs() -> (DatabaseConnection, DatabaseConnection) {
    let auth_db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    AuthMigrator::up(&auth_db, None)
        .await
        .expect("Failed to run auth migrations");

    let audit_db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create audit database");

    AuditMigrator::up(&audit_db, None)
        .await
        .expect("Failed to run audit migrations");

    (auth_db, audit_db)
}

/// Secrets that satisfy the minimum length rules
pub fn test_secrets() -> SecretManager {
    SecretManager::from_values(
        "test-secret-key-minimum-32-characters-long",
        "test-pepper-for-unit-tests",
        "test-token-hash-secret-minimum-32-chars",
    )
    .expect("Test secrets should be valid")
}

/// Cheapest Argon2 parameters, so hashing does not dominate test time
pub fn fast_hash_settings() -> PasswordHashSettings {
    PasswordHashSettings {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Unverified row for `CredentialStore::create_user` with a placeholder hash
pub fn new_user(username: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
        email_verified: false,
        verification_token_hash: None,
        verification_expires_at: None,
    }
}

/// Full AppData over in-memory databases with a recording notifier
pub async fn setup_test_app_data() -> (Arc<AppData>, Arc<InMemoryNotifier>) {
    let notifier = Arc::new(InMemoryNotifier::new());
    let app_data = setup_test_app_data_with(notifier.clone()).await;
    (app_data, notifier)
}

/// Full AppData over in-memory databases with the given notifier
pub async fn setup_test_app_data_with(notifier: Arc<dyn Notifier>) -> Arc<AppData> {
    let (auth, audit) = setup_test_dbs().await;
    let settings = AppSettings::from_env_provider(&MockEnvironment::empty())
        .expect("Default settings should load")
        .with_password_hash(fast_hash_settings());

    let app_data = AppData::build(
        settings,
        DatabaseConnections { auth, audit },
        test_secrets(),
        notifier,
    )
    .expect("Failed to build AppData");

    Arc::new(app_data)
}

/// Verified, active user with password `TEST_PASSWORD`
pub async fn create_user(app_data: &AppData, username: &str, role: Role) -> user::Model {
    let password_hash = app_data
        .crypto
        .hash_password(TEST_PASSWORD)
        .expect("Failed to hash password");

    app_data
        .credential_store
        .create_user(NewUser {
            password_hash,
            email_verified: true,
            ..new_user(username, &format!("{}@example.com", username), role)
        })
        .await
        .expect("Failed to create user")
}

/// Context as the access gate would build it for a valid token
pub fn authenticated_context(user_id: &str, role: Role, email_verified: bool) -> RequestContext {
    let now = chrono::Utc::now().timestamp();
    RequestContext::for_api(None).with_auth(Claims {
        sub: user_id.to_string(),
        role,
        email_verified,
        exp: now + 3600,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    })
}

/// Notifier whose every delivery fails
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("smtp unreachable".to_string()))
    }
}
