use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::types::db::user;
use crate::types::internal::Role;

/// Request model for account registration
#[derive(Object, Debug)]
pub struct RegisterRequest {
    /// 3-50 characters: letters, digits, `_`, `.` or `-`
    pub username: String,

    pub email: String,

    /// Plaintext password, checked against the password policy
    pub password: String,

    /// Requested role (defaults to DataEntry; SuperAdmin cannot self-register)
    pub role: Option<Role>,
}

/// Request model for user login
#[derive(Object, Debug)]
pub struct LoginRequest {
    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,
}

/// Public view of a user account. Never carries the password hash or tokens.
#[derive(Object, Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// User ID (UUID)
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub profile_picture: Option<String>,
    /// Last successful login (Unix timestamp)
    pub last_login_at: Option<i64>,
    /// Account creation time (Unix timestamp)
    pub created_at: i64,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            phone_number: user.phone_number,
            department: user.department,
            profile_picture: user.profile_picture,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Response model for a successful login
#[derive(Object, Debug)]
pub struct LoginResponse {
    /// JWT bearer token
    pub token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Token expiration time (Unix timestamp)
    pub expires_at: i64,

    pub user: UserProfile,
}

/// Request model for email verification
#[derive(Object, Debug)]
pub struct VerifyEmailRequest {
    /// Token from the verification message
    pub token: String,
}

/// Request model for starting a password reset
#[derive(Object, Debug)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

/// Request model for completing a password reset
#[derive(Object, Debug)]
pub struct ResetPasswordRequest {
    /// Token from the reset message
    pub token: String,

    pub new_password: String,
}

/// Request model for password change
#[derive(Object, Debug)]
pub struct ChangePasswordRequest {
    /// Current password for verification
    pub current_password: String,

    /// New password to set
    pub new_password: String,
}

/// Request model for profile update. Omitted fields are left unchanged,
/// an empty string clears the field.
#[derive(Object, Debug, Default)]
pub struct UpdateProfileRequest {
    pub phone_number: Option<String>,
    pub department: Option<String>,
    /// Reference to an externally stored image
    pub profile_picture: Option<String>,
}

/// API response for register endpoint
#[derive(ApiResponse)]
pub enum RegisterApiResponse {
    /// Account created; a verification message was sent
    #[oai(status = 201)]
    Created(Json<UserProfile>),
}
