use thiserror::Error;

pub mod audit;
pub mod authorization;
pub mod credential;
pub mod database;
pub mod permission_request;

pub use audit::AuditError;
pub use authorization::AuthorizationError;
pub use credential::CredentialError;
pub use database::DatabaseError;
pub use permission_request::PermissionRequestError;

/// Internal error type for store, provider and coordinator operations
///
/// Infrastructure variants are shared; domain variants carry the specific
/// failure. Never exposed via the API: endpoints convert through
/// `ApiError::from_internal_error`.
#[derive(Error, Debug)]
pub enum InternalError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Parse error: failed to parse {value_type}: {message}")]
    Parse { value_type: String, message: String },

    #[error("Crypto error: {operation} failed: {message}")]
    Crypto { operation: String, message: String },

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    PermissionRequest(#[from] PermissionRequestError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl InternalError {
    pub fn database(operation: &str, source: sea_orm::DbErr) -> Self {
        InternalError::Database(DatabaseError::Operation {
            operation: operation.to_string(),
            source,
        })
    }

    pub fn parse(value_type: &str, message: impl Into<String>) -> Self {
        InternalError::Parse {
            value_type: value_type.to_string(),
            message: message.into(),
        }
    }

    pub fn crypto(operation: &str, message: impl Into<String>) -> Self {
        InternalError::Crypto {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        InternalError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
