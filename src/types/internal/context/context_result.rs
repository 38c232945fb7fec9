use super::request_context::RequestContext;

/// Outcome of authenticating a request, carrying the context in both cases
pub enum ContextResult {
    /// Token valid and email verified
    Ok(RequestContext),
    /// Token valid but the account has not verified its email yet
    VerificationRequired(RequestContext),
}

impl ContextResult {
    /// Extract the context regardless of verification state
    ///
    /// Only for endpoints that stay reachable before verification
    /// (/auth/whoami, /auth/resend-verification).
    pub fn into_context(self) -> RequestContext {
        match self {
            ContextResult::Ok(ctx) => ctx,
            ContextResult::VerificationRequired(ctx) => ctx,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, ContextResult::Ok(_))
    }
}
