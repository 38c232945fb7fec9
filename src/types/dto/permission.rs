use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::types::db::permission_request;
use crate::types::internal::permission::{Permission, RequestStatus, ReviewDecision};

/// Request model for asking to be granted a permission
#[derive(Object, Debug)]
pub struct CreatePermissionRequest {
    pub permission: Permission,

    /// Why the permission is needed
    pub reason: String,

    /// User the permission is requested for, when not the caller
    pub target_user_id: Option<String>,
}

/// Request model for reviewing a pending request
#[derive(Object, Debug)]
pub struct ReviewPermissionRequest {
    pub decision: ReviewDecision,

    pub comments: Option<String>,
}

#[derive(Object, Debug, Clone, PartialEq)]
pub struct PermissionRequestResponse {
    pub id: String,
    pub requester_id: String,
    pub target_user_id: Option<String>,
    pub permission: Permission,
    pub reason: String,
    pub status: RequestStatus,
    pub reviewer_id: Option<String>,
    pub review_comments: Option<String>,
    pub reviewed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<permission_request::Model> for PermissionRequestResponse {
    fn from(model: permission_request::Model) -> Self {
        Self {
            id: model.id,
            requester_id: model.requester_id,
            target_user_id: model.target_user_id,
            permission: model.permission,
            reason: model.reason,
            status: model.status,
            reviewer_id: model.reviewer_id,
            review_comments: model.review_comments,
            reviewed_at: model.reviewed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One page of permission requests
#[derive(Object, Debug)]
pub struct PermissionRequestPage {
    pub items: Vec<PermissionRequestResponse>,
    pub total: u64,
    pub pages: u64,
    pub page: u64,
}

/// API response for creating a permission request
#[derive(ApiResponse)]
pub enum CreatePermissionApiResponse {
    /// Request stored as Pending
    #[oai(status = 201)]
    Created(Json<PermissionRequestResponse>),
}
