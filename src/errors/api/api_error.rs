use std::fmt;

use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::errors::internal::{
    AuthorizationError, CredentialError, InternalError, PermissionRequestError,
};
use crate::types::internal::Role;

/// Error body shared by every endpoint
#[derive(Object, Debug, Clone)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,

    /// Stable error code
    pub error: String,

    /// Human-readable message
    pub message: String,

    /// Roles allowed on the route, for role failures
    #[oai(skip_serializing_if_is_none)]
    pub required_roles: Option<Vec<Role>>,

    /// Caller's role, for role failures
    #[oai(skip_serializing_if_is_none)]
    pub user_role: Option<Role>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            error: error.to_string(),
            message: message.into(),
            required_roles: None,
            user_role: None,
        })
    }
}

/// Client-facing error for every route
#[derive(ApiResponse, Debug)]
pub enum ApiError {
    /// Malformed input
    #[oai(status = 400)]
    Validation(Json<ErrorResponse>),

    /// Username or email already taken
    #[oai(status = 409)]
    Conflict(Json<ErrorResponse>),

    /// Bad login or wrong current password
    #[oai(status = 401)]
    InvalidCredentials(Json<ErrorResponse>),

    /// Missing or rejected bearer token
    #[oai(status = 401)]
    Unauthenticated(Json<ErrorResponse>),

    /// Valid token, not allowed here
    #[oai(status = 403)]
    Forbidden(Json<ErrorResponse>),

    #[oai(status = 403)]
    AccountDeactivated(Json<ErrorResponse>),

    /// Unknown verification or reset token
    #[oai(status = 400)]
    InvalidToken(Json<ErrorResponse>),

    /// Verification or reset token past its expiry
    #[oai(status = 410)]
    ExpiredToken(Json<ErrorResponse>),

    #[oai(status = 404)]
    NotFound(Json<ErrorResponse>),

    #[oai(status = 409)]
    AlreadyReviewed(Json<ErrorResponse>),

    /// The change would leave no active SuperAdmin
    #[oai(status = 409)]
    LastSuperAdmin(Json<ErrorResponse>),

    #[oai(status = 500)]
    Internal(Json<ErrorResponse>),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(ErrorResponse::new("validation_error", message))
    }

    pub fn conflict(error: &str, message: &str) -> Self {
        ApiError::Conflict(ErrorResponse::new(error, message))
    }

    pub fn invalid_credentials() -> Self {
        ApiError::InvalidCredentials(ErrorResponse::new(
            "invalid_credentials",
            "Invalid username or password",
        ))
    }

    pub fn incorrect_password() -> Self {
        ApiError::InvalidCredentials(ErrorResponse::new(
            "invalid_credentials",
            "Current password is incorrect",
        ))
    }

    pub fn unauthenticated(message: &str) -> Self {
        ApiError::Unauthenticated(ErrorResponse::new("unauthenticated", message))
    }

    pub fn forbidden(error: &str, message: &str) -> Self {
        ApiError::Forbidden(ErrorResponse::new(error, message))
    }

    /// Role not in the route's allow-list; both sides are disclosed
    pub fn insufficient_role(required: &[Role], actual: Role) -> Self {
        let Json(mut body) = ErrorResponse::new(
            "forbidden",
            "Your role does not have access to this resource",
        );
        body.required_roles = Some(required.to_vec());
        body.user_role = Some(actual);
        ApiError::Forbidden(Json(body))
    }

    pub fn account_deactivated() -> Self {
        ApiError::AccountDeactivated(ErrorResponse::new(
            "account_deactivated",
            "This account has been deactivated",
        ))
    }

    pub fn invalid_token() -> Self {
        ApiError::InvalidToken(ErrorResponse::new(
            "invalid_token",
            "The token is invalid or has already been used",
        ))
    }

    pub fn expired_token() -> Self {
        ApiError::ExpiredToken(ErrorResponse::new("expired_token", "The token has expired"))
    }

    pub fn not_found(message: &str) -> Self {
        ApiError::NotFound(ErrorResponse::new("not_found", message))
    }

    pub fn already_reviewed() -> Self {
        ApiError::AlreadyReviewed(ErrorResponse::new(
            "already_reviewed",
            "This permission request has already been reviewed",
        ))
    }

    pub fn last_super_admin() -> Self {
        ApiError::LastSuperAdmin(ErrorResponse::new(
            "last_super_admin",
            "At least one active SuperAdmin must remain",
        ))
    }

    /// Generic 500; internal details stay in the logs
    pub fn internal_server_error() -> Self {
        ApiError::Internal(ErrorResponse::new("internal_error", "An internal error occurred"))
    }

    /// Convert InternalError to ApiError
    ///
    /// This is the single conversion point from internal errors to API errors.
    /// Infrastructure failures are logged and replaced by a generic message.
    pub fn from_internal_error(err: InternalError) -> Self {
        match &err {
            // Infrastructure errors - always log and return generic error
            InternalError::Database(db_err) => {
                tracing::error!("Database error in {}: {}", db_err.operation(), err);
                Self::internal_server_error()
            }
            InternalError::Parse { value_type, .. } => {
                tracing::error!("Parse error for {}: {}", value_type, err);
                Self::internal_server_error()
            }
            InternalError::Crypto { operation, .. } => {
                tracing::error!("Crypto error in {}: {}", operation, err);
                Self::internal_server_error()
            }
            InternalError::Audit(audit_err) => {
                tracing::error!("Audit error: {}", audit_err);
                Self::internal_server_error()
            }

            InternalError::Validation { field, message } => {
                tracing::debug!("Validation failed on {}: {}", field, message);
                Self::validation(message.clone())
            }

            InternalError::Credential(cred) => match cred {
                CredentialError::InvalidCredentials => {
                    tracing::debug!("Invalid credentials attempt");
                    Self::invalid_credentials()
                }
                CredentialError::IncorrectPassword => {
                    tracing::debug!("Incorrect current password on password change");
                    Self::incorrect_password()
                }
                CredentialError::AccountDeactivated => Self::account_deactivated(),
                CredentialError::PasswordValidationFailed(message) => {
                    tracing::debug!("Password validation failed: {}", message);
                    Self::validation(message.clone())
                }
                CredentialError::DuplicateUsername(username) => {
                    tracing::warn!("Duplicate username attempt: {}", username);
                    Self::conflict("duplicate_username", "Username already exists")
                }
                CredentialError::DuplicateEmail(_) => {
                    tracing::warn!("Duplicate email registration attempt");
                    Self::conflict("duplicate_email", "Email is already registered")
                }
                CredentialError::UserNotFound(_) => Self::not_found("User not found"),
                CredentialError::InvalidToken { token_type } => {
                    tracing::debug!("Invalid {} token", token_type);
                    Self::invalid_token()
                }
                CredentialError::ExpiredToken { token_type } => {
                    tracing::debug!("Expired {} token", token_type);
                    Self::expired_token()
                }
                CredentialError::LastSuperAdmin => {
                    tracing::warn!("Refused change that would remove the last SuperAdmin");
                    Self::last_super_admin()
                }
            },

            InternalError::Authorization(authz) => match authz {
                AuthorizationError::MissingToken => {
                    Self::unauthenticated("Authorization header with a bearer token is required")
                }
                AuthorizationError::InvalidToken(reason) => {
                    tracing::debug!("Bearer token rejected: {}", reason);
                    Self::unauthenticated("Invalid or expired token")
                }
                AuthorizationError::InsufficientRole { required, actual } => {
                    tracing::debug!("Role {} denied, required {:?}", actual, required);
                    Self::insufficient_role(required, *actual)
                }
                AuthorizationError::EmailNotVerified => Self::forbidden(
                    "email_not_verified",
                    "Verify your email address before using this resource",
                ),
                AuthorizationError::NotOwner(_) => {
                    Self::forbidden("forbidden", "You do not have access to this resource")
                }
            },

            InternalError::PermissionRequest(pr) => match pr {
                PermissionRequestError::NotFound(_) => {
                    Self::not_found("Permission request not found")
                }
                PermissionRequestError::TargetUserNotFound(_) => {
                    Self::not_found("Target user not found")
                }
                PermissionRequestError::AlreadyReviewed { .. } => Self::already_reviewed(),
            },
        }
    }

    fn body(&self) -> &ErrorResponse {
        match self {
            ApiError::Validation(json)
            | ApiError::Conflict(json)
            | ApiError::InvalidCredentials(json)
            | ApiError::Unauthenticated(json)
            | ApiError::Forbidden(json)
            | ApiError::AccountDeactivated(json)
            | ApiError::InvalidToken(json)
            | ApiError::ExpiredToken(json)
            | ApiError::NotFound(json)
            | ApiError::AlreadyReviewed(json)
            | ApiError::LastSuperAdmin(json)
            | ApiError::Internal(json) => &json.0,
        }
    }

    /// Error code from the body
    pub fn code(&self) -> &str {
        &self.body().error
    }

    /// Error message from the body
    pub fn message(&self) -> String {
        self.body().message.clone()
    }

    pub fn required_roles(&self) -> Option<&[Role]> {
        self.body().required_roles.as_deref()
    }

    pub fn user_role(&self) -> Option<Role> {
        self.body().user_role
    }

    /// HTTP status the variant is sent with
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) | ApiError::InvalidToken(_) => 400,
            ApiError::InvalidCredentials(_) | ApiError::Unauthenticated(_) => 401,
            ApiError::Forbidden(_) | ApiError::AccountDeactivated(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) | ApiError::AlreadyReviewed(_) | ApiError::LastSuperAdmin(_) => {
                409
            }
            ApiError::ExpiredToken(_) => 410,
            ApiError::Internal(_) => 500,
        }
    }
}

impl From<InternalError> for ApiError {
    fn from(err: InternalError) -> Self {
        Self::from_internal_error(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}
