use std::sync::Arc;

use crate::audit::AuditBuilder;
use crate::stores::AuditStore;
use crate::types::internal::action_outcome::{SideChannel, SideEffectReport};
use crate::types::internal::audit::{AuditAction, AuditEntry};
use crate::types::internal::context::RequestContext;

/// Best-effort writer for the audit log
///
/// The primary operation has already committed when an entry is written, so
/// a failed write is logged and returned as a `SideEffectReport` instead of
/// an error.
pub struct AuditLogger {
    pub audit_store: Arc<AuditStore>,
}

impl AuditLogger {
    pub fn new(audit_store: Arc<AuditStore>) -> Self {
        Self { audit_store }
    }

    /// Start building an entry for `action`
    pub fn builder(&self, action: impl Into<AuditAction>) -> AuditBuilder {
        AuditBuilder::new(self.audit_store.clone(), action)
    }

    /// Builder preloaded with the request context
    pub fn for_context(&self, action: impl Into<AuditAction>, ctx: &RequestContext) -> AuditBuilder {
        self.builder(action).with_context(ctx)
    }

    /// Append a prepared entry
    pub async fn record(&self, entry: AuditEntry) -> SideEffectReport {
        record_entry(&self.audit_store, entry).await
    }
}

pub(crate) async fn record_entry(store: &AuditStore, entry: AuditEntry) -> SideEffectReport {
    let action = entry.action.to_string();
    match store.append(entry).await {
        Ok(_) => SideEffectReport::succeeded(SideChannel::Audit),
        Err(e) => {
            tracing::error!("Failed to write audit log entry {}: {}", action, e);
            SideEffectReport::failed(SideChannel::Audit, e.to_string())
        }
    }
}
