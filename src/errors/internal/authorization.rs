use thiserror::Error;

use crate::types::internal::Role;

/// Outcome of the access gate when a request is not let through
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("Authorization header is missing")]
    MissingToken,

    #[error("Bearer token rejected: {0}")]
    InvalidToken(String),

    #[error("Role {actual} is not permitted; required one of {required:?}")]
    InsufficientRole { required: Vec<Role>, actual: Role },

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Caller may not access resource {0}")]
    NotOwner(String),
}
