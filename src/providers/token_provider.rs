use std::fmt;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::config::SecretManager;
use crate::errors::InternalError;
use crate::types::internal::Role;
use crate::types::internal::auth::{Claims, IssuedToken};

/// Why a bearer token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is malformed")]
    Malformed,
}

/// Issues and verifies signed bearer tokens (HS256)
///
/// Stateless: the signing key is fixed at construction and there is no
/// revocation list, so a token stays valid until it expires.
pub struct TokenProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl TokenProvider {
    pub fn new(secret_manager: &SecretManager, ttl_hours: i64) -> Self {
        let secret = secret_manager.jwt_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_hours,
        }
    }

    pub fn ttl_hours(&self) -> i64 {
        self.ttl_hours
    }

    /// Sign a token for the user, expiring after the configured TTL
    pub fn issue(
        &self,
        user_id: &str,
        role: Role,
        email_verified: bool,
    ) -> Result<IssuedToken, InternalError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            email_verified,
            exp: now + self.ttl_hours * 3600,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        let token = self.sign(&claims)?;
        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Sign arbitrary claims with the service key
    pub fn sign(&self, claims: &Claims) -> Result<String, InternalError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| InternalError::crypto("jwt_generation", format!("Failed to generate JWT: {}", e)))
    }

    /// Validate signature and expiry and return the claims
    ///
    /// Never panics on garbage input; every failure maps to a `TokenRejection`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenRejection::BadSignature
                }
                _ => TokenRejection::Malformed,
            })
    }
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("secret", &"<redacted>")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl fmt::Display for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenProvider {{ ttl: {}h }}", self.ttl_hours)
    }
}
