use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
};

use crate::errors::InternalError;
use crate::types::db::audit_log::{self, Column, Entity as AuditLog};
use crate::types::internal::audit::{AuditEntry, AuditFilter};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Repository for the append-only audit log
///
/// Exposes insert and read paths only.
pub struct AuditStore {
    db: DatabaseConnection,
}

impl AuditStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append one entry
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if serialization or the insert fails
    pub async fn append(&self, entry: AuditEntry) -> Result<audit_log::Model, InternalError> {
        let old_values = entry
            .old_values
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| InternalError::parse("audit old_values", e.to_string()))?;
        let new_values = entry
            .new_values
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| InternalError::parse("audit new_values", e.to_string()))?;

        let model = audit_log::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            action: Set(entry.action.as_str().to_string()),
            details: Set(entry.details),
            actor_id: Set(entry.actor_id),
            ip_address: Set(entry.ip_address),
            table_name: Set(entry.table_name),
            record_id: Set(entry.record_id),
            old_values: Set(old_values),
            new_values: Set(new_values),
            request_id: Set(entry.request_id),
            created_at: Set(Utc::now().timestamp()),
        };

        model
            .insert(&self.db)
            .await
            .map_err(|e| InternalError::database("write_audit_log", e))
    }

    /// One page of matching entries, newest first, plus the total match count
    ///
    /// `page` is 1-based; `page_size` is clamped to 1..=100.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), InternalError> {
        let page_size = clamp_page_size(page_size);
        let paginator = Self::filtered(filter).paginate(&self.db, page_size);

        let total = paginator
            .num_items()
            .await
            .map_err(|e| InternalError::database("count_audit_logs", e))?;
        let items = paginator
            .fetch_page(page.max(1) - 1)
            .await
            .map_err(|e| InternalError::database("list_audit_logs", e))?;

        Ok((items, total))
    }

    /// Every matching entry, newest first
    pub async fn export(&self, filter: &AuditFilter) -> Result<Vec<audit_log::Model>, InternalError> {
        Self::filtered(filter)
            .all(&self.db)
            .await
            .map_err(|e| InternalError::database("export_audit_logs", e))
    }

    fn filtered(filter: &AuditFilter) -> Select<AuditLog> {
        let mut condition = Condition::all();

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(Column::Action.contains(search))
                    .add(Column::Details.contains(search)),
            );
        }
        if let Some(action) = &filter.action {
            condition = condition.add(Column::Action.eq(action.as_str()));
        }
        if let Some(user) = &filter.user {
            condition = condition.add(Column::ActorId.eq(user.as_str()));
        }
        if let Some(from) = filter.from {
            condition = condition.add(Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            condition = condition.add(Column::CreatedAt.lt(to));
        }

        AuditLog::find()
            .filter(condition)
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
    }
}

pub fn clamp_page_size(page_size: u64) -> u64 {
    if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    }
}

/// Normalise a 1-based page number against an already clamped page size
///
/// Pages whose row offset does not fit a signed 64-bit integer are rejected
/// before they reach the paginator.
pub fn validate_page(page: u64, page_size: u64) -> Result<u64, InternalError> {
    let page = page.max(1);
    match (page - 1).checked_mul(page_size) {
        Some(offset) if offset <= i64::MAX as u64 => Ok(page),
        _ => Err(InternalError::validation("page", "Page number is out of range")),
    }
}
