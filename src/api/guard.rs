use std::sync::Arc;

use poem::Request;

use crate::errors::ApiError;
use crate::errors::internal::AuthorizationError;
use crate::providers::TokenProvider;
use crate::types::internal::auth::Claims;
use crate::types::internal::context::{ContextResult, RequestContext};
use crate::types::internal::Role;

pub use crate::types::internal::role::{ADMINISTRATORS, ANY_ROLE, AUDIT_READERS, SUPER_ADMIN_ONLY};

/// Per-request access gate
///
/// Verifies the bearer token and checks its role against the route's
/// allow-list. No database I/O: the role comes from the token, so a demoted
/// user keeps the old role until the token expires.
#[derive(Clone)]
pub struct AccessGuard {
    tokens: Arc<TokenProvider>,
}

impl AccessGuard {
    pub fn new(tokens: Arc<TokenProvider>) -> Self {
        Self { tokens }
    }

    /// Check an `Authorization` header value against `allowed`
    ///
    /// # Returns
    /// * `Ok(claims)` - token valid and role allowed
    /// * `Err(MissingToken)` - no header, or an empty one
    /// * `Err(InvalidToken)` - not a Bearer header, or verification failed
    /// * `Err(InsufficientRole)` - role not in `allowed`
    pub fn authorize_header(
        &self,
        header: Option<&str>,
        allowed: &[Role],
    ) -> Result<Claims, AuthorizationError> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(AuthorizationError::MissingToken)?;

        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => {
                return Err(AuthorizationError::InvalidToken(
                    "expected Bearer scheme".to_string(),
                ));
            }
        };

        let claims = self
            .tokens
            .verify(token)
            .map_err(|rejection| AuthorizationError::InvalidToken(rejection.to_string()))?;

        if !allowed.contains(&claims.role) {
            return Err(AuthorizationError::InsufficientRole {
                required: allowed.to_vec(),
                actual: claims.role,
            });
        }

        Ok(claims)
    }

    /// Authenticate the request and build its context
    ///
    /// Unverified accounts come back as `ContextResult::VerificationRequired`.
    pub fn authorize(&self, req: &Request, allowed: &[Role]) -> Result<ContextResult, ApiError> {
        let claims = self
            .authorize_header(req.header("Authorization"), allowed)
            .map_err(|e| {
                tracing::debug!("Request to {} rejected: {}", req.uri().path(), e);
                ApiError::from_internal_error(e.into())
            })?;

        let verified = claims.email_verified;
        let ctx = RequestContext::from_request(req).with_auth(claims);

        Ok(if verified {
            ContextResult::Ok(ctx)
        } else {
            ContextResult::VerificationRequired(ctx)
        })
    }

    /// Authenticate and require a verified email
    pub fn require(&self, req: &Request, allowed: &[Role]) -> Result<RequestContext, ApiError> {
        match self.authorize(req, allowed)? {
            ContextResult::Ok(ctx) => Ok(ctx),
            ContextResult::VerificationRequired(_) => Err(ApiError::from_internal_error(
                AuthorizationError::EmailNotVerified.into(),
            )),
        }
    }

    /// Authenticate without the verification requirement
    ///
    /// Only for whoami and resend-verification.
    pub fn require_allow_unverified(
        &self,
        req: &Request,
        allowed: &[Role],
    ) -> Result<RequestContext, ApiError> {
        Ok(self.authorize(req, allowed)?.into_context())
    }
}
