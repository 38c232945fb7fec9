use chrono::Utc;
use poem_openapi::{ApiResponse, OpenApi, Tags, payload::Json};
use sea_orm::DatabaseConnection;

use crate::config::DatabaseConnections;
use crate::types::dto::common::HealthResponse;

/// Health check API
pub struct HealthApi {
    connections: DatabaseConnections,
}

impl HealthApi {
    pub fn new(connections: DatabaseConnections) -> Self {
        Self { connections }
    }
}

/// API tags for health endpoints
#[derive(Tags)]
enum ApiTags {
    /// Health check endpoints
    Health,
}

#[derive(ApiResponse)]
enum HealthApiResponse {
    /// Both databases answer
    #[oai(status = 200)]
    Healthy(Json<HealthResponse>),

    /// At least one database is unreachable
    #[oai(status = 503)]
    Degraded(Json<HealthResponse>),
}

async fn probe(name: &str, db: &DatabaseConnection) -> bool {
    match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check: {} database unreachable: {}", name, e);
            false
        }
    }
}

fn label(up: bool) -> String {
    if up { "up" } else { "down" }.to_string()
}

#[OpenApi]
impl HealthApi {
    /// Health check endpoint
    ///
    /// Pings the auth and audit databases
    #[oai(path = "/health", method = "get", tag = "ApiTags::Health")]
    async fn health(&self) -> HealthApiResponse {
        let auth_up = probe("auth", &self.connections.auth).await;
        let audit_up = probe("audit", &self.connections.audit).await;

        let body = HealthResponse {
            status: if auth_up && audit_up { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            auth_database: label(auth_up),
            audit_database: label(audit_up),
        };

        if auth_up && audit_up {
            HealthApiResponse::Healthy(Json(body))
        } else {
            HealthApiResponse::Degraded(Json(body))
        }
    }
}
