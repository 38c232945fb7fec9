use poem_openapi::Object;
use serde::Serialize;

use crate::types::db::audit_log;
use crate::types::internal::Role;

/// One audit log row as returned to readers and written to JSON exports
#[derive(Object, Serialize, Debug, Clone, PartialEq)]
pub struct AuditLogItem {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    /// JSON snapshot before the change
    pub old_values: Option<serde_json::Value>,
    /// JSON snapshot after the change
    pub new_values: Option<serde_json::Value>,
    pub request_id: Option<String>,
    /// Unix timestamp
    pub created_at: i64,
}

impl From<audit_log::Model> for AuditLogItem {
    fn from(model: audit_log::Model) -> Self {
        Self {
            id: model.id,
            action: model.action,
            details: model.details,
            actor_id: model.actor_id,
            ip_address: model.ip_address,
            table_name: model.table_name,
            record_id: model.record_id,
            old_values: model.old_values.as_deref().and_then(parse_snapshot),
            new_values: model.new_values.as_deref().and_then(parse_snapshot),
            request_id: model.request_id,
            created_at: model.created_at,
        }
    }
}

fn parse_snapshot(raw: &str) -> Option<serde_json::Value> {
    serde_json::from_str(raw).ok()
}

/// One page of audit log entries
#[derive(Object, Debug)]
pub struct AuditLogPage {
    pub items: Vec<AuditLogItem>,
    pub total: u64,
    pub pages: u64,
    pub page: u64,
}

/// Request to change a user's role
#[derive(Object, Debug)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// Request to activate or deactivate a user
#[derive(Object, Debug)]
pub struct SetActiveRequest {
    pub is_active: bool,
}
