use thiserror::Error;

/// Failures of the account lifecycle: login, tokens, uniqueness
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Unknown username or wrong password, deliberately indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Wrong current password on an authenticated password change
    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Password validation failed: {0}")]
    PasswordValidationFailed(String),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid token: {token_type}")]
    InvalidToken { token_type: String },

    #[error("Expired token: {token_type}")]
    ExpiredToken { token_type: String },

    #[error("Operation would leave no active SuperAdmin")]
    LastSuperAdmin,
}

impl CredentialError {
    pub fn invalid_token(token_type: &str) -> Self {
        Self::InvalidToken {
            token_type: token_type.to_string(),
        }
    }

    pub fn expired_token(token_type: &str) -> Self {
        Self::ExpiredToken {
            token_type: token_type.to_string(),
        }
    }
}
