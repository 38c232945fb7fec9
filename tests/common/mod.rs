// Common test utilities for integration tests

use std::sync::Arc;

use migration::{AuditMigrator, AuthMigrator, MigratorTrait};
use poem::endpoint::BoxEndpoint;
use poem::test::{TestClient, TestResponse};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};

use council_auth::api::build_routes;
use council_auth::app_data::AppData;
use council_auth::config::{
    AppSettings, DatabaseConnections, EnvironmentProvider, PasswordHashSettings, SecretManager,
};
use council_auth::providers::InMemoryNotifier;
use council_auth::stores::NewUser;
use council_auth::types::db::user;
use council_auth::types::internal::Role;

pub const PASSWORD: &str = "test-pass-2024";

/// Environment with nothing set, so every setting takes its default
struct EmptyEnvironment;

impl EnvironmentProvider for EmptyEnvironment {
    fn get_var(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Creates a database with the given migrator applied
async fn migrated_memory_db<M: MigratorTrait>() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    M::up(&db, None).await.expect("Failed to run migrations");
    db
}

/// The full route tree over in-memory databases
pub struct TestApp {
    pub client: TestClient<BoxEndpoint<'static>>,
    pub app_data: Arc<AppData>,
    pub notifier: Arc<InMemoryNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let auth = migrated_memory_db::<AuthMigrator>().await;
        let audit = migrated_memory_db::<AuditMigrator>().await;

        let settings = AppSettings::from_env_provider(&EmptyEnvironment)
            .expect("Default settings should load")
            .with_password_hash(PasswordHashSettings {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            });

        let secrets = SecretManager::from_values(
            "integration-secret-key-minimum-32-characters",
            "integration-pepper-value",
            "integration-token-hash-secret-32-characters",
        )
        .expect("Test secrets should be valid");

        let notifier = Arc::new(InMemoryNotifier::new());
        let app_data = Arc::new(
            AppData::build(
                settings,
                DatabaseConnections { auth, audit },
                secrets,
                notifier.clone(),
            )
            .expect("Failed to build AppData"),
        );

        let client = TestClient::new(build_routes(app_data.clone(), "http://localhost/api"));

        Self {
            client,
            app_data,
            notifier,
        }
    }

    /// Insert a verified user with password `PASSWORD`
    pub async fn seed_user(&self, username: &str, role: Role) -> user::Model {
        let password_hash = self
            .app_data
            .crypto
            .hash_password(PASSWORD)
            .expect("Failed to hash password");

        self.app_data
            .credential_store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
                role,
                email_verified: true,
                verification_token_hash: None,
                verification_expires_at: None,
            })
            .await
            .expect("Failed to create user")
    }

    /// Log in through the API and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let resp = self
            .client
            .post("/api/auth/login")
            .body_json(&json!({ "username": username, "password": password }))
            .send()
            .await;
        let (status, body) = read_json(resp).await;
        assert_eq!(status, 200, "login failed: {}", body);
        body["token"].as_str().expect("token in body").to_string()
    }

    /// Seed a verified user and log in as them
    pub async fn token_for(&self, username: &str, role: Role) -> (user::Model, String) {
        let user = self.seed_user(username, role).await;
        let token = self.login(username, PASSWORD).await;
        (user, token)
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Status code and JSON body of a response
pub async fn read_json(resp: TestResponse) -> (u16, Value) {
    let status = resp.0.status().as_u16();
    let body = resp
        .0
        .into_body()
        .into_json::<Value>()
        .await
        .unwrap_or(Value::Null);
    (status, body)
}
