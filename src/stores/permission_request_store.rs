use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::errors::InternalError;
use crate::errors::internal::PermissionRequestError;
use crate::types::db::permission_request::{self, ActiveModel, Column, Entity as PermissionRequest};
use crate::types::internal::permission::{Permission, RequestStatus, ReviewDecision};

/// Filter for listing permission requests; fields combine with AND
#[derive(Debug, Clone, Default)]
pub struct PermissionRequestFilter {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<String>,
}

/// Data access for the permission request workflow
pub struct PermissionRequestStore {
    db: DatabaseConnection,
}

impl PermissionRequestStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new Pending request
    pub async fn create(
        &self,
        requester_id: &str,
        permission: Permission,
        reason: &str,
        target_user_id: Option<String>,
    ) -> Result<permission_request::Model, InternalError> {
        let now = Utc::now().timestamp();

        let model = ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            requester_id: Set(requester_id.to_string()),
            target_user_id: Set(target_user_id),
            permission: Set(permission),
            reason: Set(reason.to_string()),
            status: Set(RequestStatus::Pending),
            reviewer_id: Set(None),
            review_comments: Set(None),
            reviewed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model
            .insert(&self.db)
            .await
            .map_err(|e| InternalError::database("create_permission_request", e))
    }

    pub async fn find_by_id(
        &self,
        request_id: &str,
    ) -> Result<Option<permission_request::Model>, InternalError> {
        PermissionRequest::find_by_id(request_id.to_owned())
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_permission_request", e))
    }

    /// Fetch a request, failing with `NotFound` when absent
    pub async fn get(&self, request_id: &str) -> Result<permission_request::Model, InternalError> {
        self.find_by_id(request_id)
            .await?
            .ok_or_else(|| PermissionRequestError::NotFound(request_id.to_string()).into())
    }

    /// Record a review decision
    ///
    /// The UPDATE only matches a row still in Pending, so of two concurrent
    /// reviews exactly one wins.
    ///
    /// # Returns
    /// * `Ok((before, after))` - the request before and after the review
    /// * `Err(PermissionRequestError::NotFound)` - unknown id
    /// * `Err(PermissionRequestError::AlreadyReviewed)` - status was not Pending
    pub async fn review(
        &self,
        request_id: &str,
        reviewer_id: &str,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> Result<(permission_request::Model, permission_request::Model), InternalError> {
        let before = self.get(request_id).await?;
        if before.status.is_terminal() {
            return Err(PermissionRequestError::AlreadyReviewed {
                id: request_id.to_string(),
                status: before.status,
            }
            .into());
        }

        let now = Utc::now().timestamp();
        let result = PermissionRequest::update_many()
            .col_expr(Column::Status, Expr::value(decision.resulting_status().as_str()))
            .col_expr(Column::ReviewerId, Expr::value(reviewer_id))
            .col_expr(Column::ReviewComments, Expr::value(comments))
            .col_expr(Column::ReviewedAt, Expr::value(now))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(request_id))
            .filter(Column::Status.eq(RequestStatus::Pending))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("review_permission_request", e))?;

        let after = self.get(request_id).await?;

        if result.rows_affected == 0 {
            // Another reviewer got there between the read and the update
            return Err(PermissionRequestError::AlreadyReviewed {
                id: request_id.to_string(),
                status: after.status,
            }
            .into());
        }

        Ok((before, after))
    }

    /// Page through requests, newest first
    ///
    /// `page` is 1-based. Returns the page and the total number of matches.
    pub async fn list(
        &self,
        filter: &PermissionRequestFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<permission_request::Model>, u64), InternalError> {
        let mut query = PermissionRequest::find();
        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status));
        }
        if let Some(requester_id) = &filter.requester_id {
            query = query.filter(Column::RequesterId.eq(requester_id.as_str()));
        }

        let paginator = query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .paginate(&self.db, page_size);

        let total = paginator
            .num_items()
            .await
            .map_err(|e| InternalError::database("count_permission_requests", e))?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| InternalError::database("list_permission_requests", e))?;

        Ok((items, total))
    }
}
