// Coordinators layer - Workflow orchestration
//
// Coordinators compose stores and providers into the operations the API and
// CLI expose. They check the caller's identity from the RequestContext and
// attach audit and notification reports to every state change.

pub mod admin_coordinator;
pub mod auth_coordinator;
pub mod permission_coordinator;

pub use admin_coordinator::{AdminCoordinator, AuditExport, SuperAdminCredentials};
pub use auth_coordinator::{AuthCoordinator, LoginResult, RegisterInput};
pub use permission_coordinator::PermissionCoordinator;

use crate::errors::InternalError;
use crate::errors::internal::AuthorizationError;
use crate::types::internal::Role;
use crate::types::internal::auth::Claims;
use crate::types::internal::context::RequestContext;

/// One page of a listing, `page` 1-based
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        crate::types::dto::common::page_count(self.total, self.page_size)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Subject of the bearer token carried by the context
pub(crate) fn require_user_id(ctx: &RequestContext) -> Result<&str, InternalError> {
    ctx.user_id()
        .ok_or_else(|| AuthorizationError::MissingToken.into())
}

/// Claims of the caller, provided its role is in `allowed`
pub(crate) fn require_role<'a>(
    ctx: &'a RequestContext,
    allowed: &[Role],
) -> Result<&'a Claims, InternalError> {
    let claims = ctx
        .claims
        .as_ref()
        .ok_or(AuthorizationError::MissingToken)?;

    if !allowed.contains(&claims.role) {
        return Err(AuthorizationError::InsufficientRole {
            required: allowed.to_vec(),
            actual: claims.role,
        }
        .into());
    }
    Ok(claims)
}
