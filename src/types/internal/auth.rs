use serde::{Deserialize, Serialize};

use super::role::Role;

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user_id)
    pub sub: String,

    /// Role at issuance time. Not re-checked against the store on use.
    pub role: Role,

    /// Whether the user had verified their email when the token was issued
    pub email_verified: bool,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// JWT ID
    pub jti: String,
}

/// A freshly signed bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}
