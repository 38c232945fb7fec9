use super::AuditLogger;
use crate::types::db::user;
use crate::types::internal::action_outcome::SideEffectReport;
use crate::types::internal::audit::AuditAction;
use crate::types::internal::context::RequestContext;

impl AuditLogger {
    /// Log that an expired single-use token was presented and cleared
    pub async fn log_token_expired(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        user: &user::Model,
        expired_at: Option<i64>,
    ) -> SideEffectReport {
        self.for_context(action, ctx)
            .details(format!("Expired token cleared for {}", user.username))
            .target("users", user.id.clone())
            .add_field("expired_at", expired_at)
            .record()
            .await
    }
}
