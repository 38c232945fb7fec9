use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::audit::audit_logger::record_entry;
use crate::stores::AuditStore;
use crate::types::internal::action_outcome::SideEffectReport;
use crate::types::internal::audit::{AuditAction, AuditEntry};
use crate::types::internal::context::RequestContext;

/// Builder for audit entries
///
/// Provides a fluent API for the optional columns and hashes sensitive
/// values so events can be correlated without storing the value itself.
///
/// # Example
/// ```ignore
/// AuditBuilder::new(audit_store.clone(), AuditAction::PasswordResetRequested)
///     .with_context(&ctx)
///     .details("Password reset requested")
///     .add_sensitive("email", "user@example.com")
///     .record()
///     .await;
/// ```
pub struct AuditBuilder {
    entry: AuditEntry,
    fields: Map<String, Value>,
    store: Arc<AuditStore>,
}

impl AuditBuilder {
    pub fn new(store: Arc<AuditStore>, action: impl Into<AuditAction>) -> Self {
        Self {
            entry: AuditEntry::new(action.into()),
            fields: Map::new(),
            store,
        }
    }

    /// Take actor, IP address and request id from the request context
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.entry.actor_id = Some(ctx.actor_id.clone());
        self.entry.ip_address = ctx.ip_string();
        self.entry.request_id = Some(ctx.request_id.to_string());
        self
    }

    /// Override the actor, e.g. when the caller was anonymous but the
    /// affected account is known
    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.entry.actor_id = Some(actor_id.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.entry.details = details.into();
        self
    }

    /// Affected table and record
    pub fn target(mut self, table_name: &str, record_id: impl Into<String>) -> Self {
        self.entry.table_name = Some(table_name.to_string());
        self.entry.record_id = Some(record_id.into());
        self
    }

    pub fn old_values(mut self, values: impl Serialize) -> Self {
        self.entry.old_values = serde_json::to_value(values).ok();
        self
    }

    pub fn new_values(mut self, values: impl Serialize) -> Self {
        self.entry.new_values = serde_json::to_value(values).ok();
        self
    }

    /// Add a field to the new-values snapshot
    pub fn add_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.fields.insert(key.into(), json_value);
        }
        self
    }

    /// Add a field stored as a SHA-256 digest
    ///
    /// Same input always produces the same digest, so repeated events for
    /// one email address can be correlated.
    pub fn add_sensitive(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(&value) {
            let mut hasher = Sha256::new();
            hasher.update(json_value.to_string().as_bytes());
            let hash_hex = format!("sha256:{:x}", hasher.finalize());

            self.fields.insert(key.into(), json!(hash_hex));
        }
        self
    }

    /// Build the entry without writing it
    pub fn build(self) -> AuditEntry {
        let mut entry = self.entry;
        if self.fields.is_empty() {
            return entry;
        }

        entry.new_values = Some(match entry.new_values.take() {
            None => Value::Object(self.fields),
            Some(Value::Object(mut existing)) => {
                existing.extend(self.fields);
                Value::Object(existing)
            }
            Some(other) => {
                let mut wrapped = self.fields;
                wrapped.insert("value".to_string(), other);
                Value::Object(wrapped)
            }
        });
        entry
    }

    /// Append the entry; a failed write is logged and reported, never returned
    pub async fn record(self) -> SideEffectReport {
        let store = self.store.clone();
        record_entry(&store, self.build()).await
    }
}
