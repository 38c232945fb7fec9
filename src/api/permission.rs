use std::sync::Arc;

use poem::Request;
use poem_openapi::{
    OpenApi, Tags,
    param::{Path, Query},
    payload::Json,
};

use crate::api::guard::{ANY_ROLE, AccessGuard, SUPER_ADMIN_ONLY};
use crate::coordinators::{Page, PermissionCoordinator};
use crate::errors::ApiError;
use crate::stores::PermissionRequestFilter;
use crate::types::db::permission_request;
use crate::types::dto::permission::{
    CreatePermissionApiResponse, CreatePermissionRequest, PermissionRequestPage,
    PermissionRequestResponse, ReviewPermissionRequest,
};
use crate::types::internal::permission::RequestStatus;

/// Permission request workflow endpoints
pub struct PermissionApi {
    coordinator: Arc<PermissionCoordinator>,
    guard: AccessGuard,
}

impl PermissionApi {
    pub fn new(coordinator: Arc<PermissionCoordinator>, guard: AccessGuard) -> Self {
        Self { coordinator, guard }
    }
}

#[derive(Tags)]
enum PermissionTags {
    /// Ask for elevated capabilities and review the requests
    PermissionRequests,
}

fn to_page(page: Page<permission_request::Model>) -> PermissionRequestPage {
    let pages = page.pages();
    let page = page.map(PermissionRequestResponse::from);
    PermissionRequestPage {
        items: page.items,
        total: page.total,
        pages,
        page: page.page,
    }
}

#[OpenApi(prefix_path = "/auth")]
impl PermissionApi {
    /// File a permission request for the caller
    #[oai(path = "/permission-requests", method = "post", tag = "PermissionTags::PermissionRequests")]
    async fn create(
        &self,
        req: &Request,
        body: Json<CreatePermissionRequest>,
    ) -> Result<CreatePermissionApiResponse, ApiError> {
        let ctx = self.guard.require(req, ANY_ROLE)?;
        let Json(body) = body;

        let outcome = self
            .coordinator
            .request(&ctx, body.permission, &body.reason, body.target_user_id)
            .await?;

        Ok(CreatePermissionApiResponse::Created(Json(
            outcome.into_value().into(),
        )))
    }

    /// List all permission requests (SuperAdmin)
    #[oai(path = "/permission-requests", method = "get", tag = "PermissionTags::PermissionRequests")]
    async fn list(
        &self,
        req: &Request,
        status: Query<Option<RequestStatus>>,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
    ) -> Result<Json<PermissionRequestPage>, ApiError> {
        let ctx = self.guard.require(req, SUPER_ADMIN_ONLY)?;
        let filter = PermissionRequestFilter {
            status: status.0,
            requester_id: None,
        };

        let result = self
            .coordinator
            .list(&ctx, filter, page.0.unwrap_or(1), limit.0.unwrap_or(0))
            .await?;
        Ok(Json(to_page(result)))
    }

    /// List the caller's own permission requests
    #[oai(path = "/permission-requests/mine", method = "get", tag = "PermissionTags::PermissionRequests")]
    async fn list_mine(
        &self,
        req: &Request,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
    ) -> Result<Json<PermissionRequestPage>, ApiError> {
        let ctx = self.guard.require(req, ANY_ROLE)?;
        let result = self
            .coordinator
            .list_mine(&ctx, page.0.unwrap_or(1), limit.0.unwrap_or(0))
            .await?;
        Ok(Json(to_page(result)))
    }

    /// Fetch one permission request
    #[oai(path = "/permission-requests/:id", method = "get", tag = "PermissionTags::PermissionRequests")]
    async fn get(
        &self,
        req: &Request,
        id: Path<String>,
    ) -> Result<Json<PermissionRequestResponse>, ApiError> {
        let ctx = self.guard.require(req, ANY_ROLE)?;
        let request = self.coordinator.get(&ctx, &id.0).await?;
        Ok(Json(request.into()))
    }

    /// Approve or deny a pending request (SuperAdmin)
    ///
    /// A request can be reviewed once; later attempts get 409.
    #[oai(path = "/permission-requests/:id/review", method = "put", tag = "PermissionTags::PermissionRequests")]
    async fn review(
        &self,
        req: &Request,
        id: Path<String>,
        body: Json<ReviewPermissionRequest>,
    ) -> Result<Json<PermissionRequestResponse>, ApiError> {
        let ctx = self.guard.require(req, SUPER_ADMIN_ONLY)?;
        let Json(body) = body;

        let outcome = self
            .coordinator
            .review(&ctx, &id.0, body.decision, body.comments)
            .await?;
        Ok(Json(outcome.into_value().into()))
    }
}
