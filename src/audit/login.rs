use serde_json::json;

use super::AuditLogger;
use crate::types::db::user;
use crate::types::internal::action_outcome::SideEffectReport;
use crate::types::internal::audit::AuditAction;
use crate::types::internal::context::RequestContext;

impl AuditLogger {
    /// Log a successful login
    ///
    /// The actor is the user who logged in; anonymous callers have no actor yet.
    pub async fn log_login_success(
        &self,
        ctx: &RequestContext,
        user: &user::Model,
        jti: &str,
    ) -> SideEffectReport {
        self.for_context(AuditAction::Login, ctx)
            .actor(user.id.clone())
            .details(format!("User {} logged in", user.username))
            .target("users", user.id.clone())
            .new_values(json!({ "jti": jti, "role": user.role }))
            .record()
            .await
    }

    /// Log a failed login
    ///
    /// The attempted username is hashed, since failed attempts often carry
    /// passwords typed into the wrong field.
    pub async fn log_login_failure(
        &self,
        ctx: &RequestContext,
        attempted_username: &str,
        reason: &str,
    ) -> SideEffectReport {
        self.for_context(AuditAction::LoginFailed, ctx)
            .details(format!("Login failed: {}", reason))
            .add_sensitive("username", attempted_username)
            .add_field("reason", reason)
            .record()
            .await
    }
}
