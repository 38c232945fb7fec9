use std::sync::Arc;

use serde_json::json;

use crate::app_data::AppData;
use crate::audit::AuditLogger;
use crate::coordinators::{Page, require_role, require_user_id};
use crate::errors::InternalError;
use crate::errors::internal::{AuthorizationError, PermissionRequestError};
use crate::providers::Notifier;
use crate::providers::notification_provider::dispatch;
use crate::stores::audit_store::{clamp_page_size, validate_page};
use crate::stores::{CredentialStore, PermissionRequestFilter, PermissionRequestStore};
use crate::types::CoordinatorResult;
use crate::types::db::permission_request;
use crate::types::internal::action_outcome::ActionOutcome;
use crate::types::internal::audit::AuditAction;
use crate::types::internal::context::RequestContext;
use crate::types::internal::notification::Notification;
use crate::types::internal::permission::{Permission, ReviewDecision};
use crate::types::internal::role::{Role, SUPER_ADMIN_ONLY};

const MAX_REASON_LENGTH: usize = 1000;

/// Permission request workflow
///
/// Any authenticated user may ask for a permission; only a SuperAdmin may
/// review. A request moves from Pending to Approved or Denied exactly once.
/// Granting the permission after approval is left to the business modules.
pub struct PermissionCoordinator {
    permission_request_store: Arc<PermissionRequestStore>,
    credential_store: Arc<CredentialStore>,
    audit_logger: Arc<AuditLogger>,
    notifier: Arc<dyn Notifier>,
}

impl PermissionCoordinator {
    pub fn new(app_data: Arc<AppData>) -> Self {
        Self {
            permission_request_store: app_data.permission_request_store.clone(),
            credential_store: app_data.credential_store.clone(),
            audit_logger: app_data.audit_logger.clone(),
            notifier: app_data.notifier.clone(),
        }
    }

    /// Create a Pending request for the caller
    ///
    /// # Returns
    /// * `Err(InternalError::Validation)` - empty or oversized reason
    /// * `Err(PermissionRequestError::TargetUserNotFound)` - unknown target user
    pub async fn request(
        &self,
        ctx: &RequestContext,
        permission: Permission,
        reason: &str,
        target_user_id: Option<String>,
    ) -> CoordinatorResult<permission_request::Model> {
        let requester_id = require_user_id(ctx)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(InternalError::validation("reason", "A reason is required"));
        }
        if reason.chars().count() > MAX_REASON_LENGTH {
            return Err(InternalError::validation(
                "reason",
                format!("Reason must not exceed {} characters", MAX_REASON_LENGTH),
            ));
        }

        let target_user_id = target_user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if let Some(target) = &target_user_id {
            if self.credential_store.find_by_id(target).await?.is_none() {
                return Err(PermissionRequestError::TargetUserNotFound(target.clone()).into());
            }
        }

        let request = self
            .permission_request_store
            .create(requester_id, permission, reason, target_user_id)
            .await?;

        tracing::info!(
            "Permission request {} for {} created by {}",
            request.id,
            permission,
            requester_id
        );

        let report = self
            .audit_logger
            .for_context(AuditAction::PermissionRequested, ctx)
            .details(format!("Requested permission {}", permission))
            .target("permission_requests", request.id.clone())
            .new_values(json!({
                "permission": request.permission,
                "reason": request.reason,
                "target_user_id": request.target_user_id,
                "status": request.status,
            }))
            .record()
            .await;

        Ok(ActionOutcome::new(request).with_report(report))
    }

    /// Approve or deny a Pending request
    ///
    /// Coordinates the sequence of operations:
    /// 1. Check the caller is a SuperAdmin
    /// 2. Apply the decision with a conditional UPDATE on status = Pending
    /// 3. Record PERMISSION_APPROVED or PERMISSION_DENIED with status snapshots
    /// 4. Notify the requester
    ///
    /// # Returns
    /// * `Err(AuthorizationError::InsufficientRole)` - caller is not a SuperAdmin
    /// * `Err(PermissionRequestError::NotFound)` - unknown request id
    /// * `Err(PermissionRequestError::AlreadyReviewed)` - request no longer Pending
    pub async fn review(
        &self,
        ctx: &RequestContext,
        request_id: &str,
        decision: ReviewDecision,
        comments: Option<String>,
    ) -> CoordinatorResult<permission_request::Model> {
        // Step 1: Only a SuperAdmin may transition a request
        let reviewer = require_role(ctx, SUPER_ADMIN_ONLY)?;

        // Step 2: Single conditional UPDATE
        let comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let (before, after) = self
            .permission_request_store
            .review(request_id, &reviewer.sub, decision, comments)
            .await?;

        tracing::info!(
            "Permission request {} {} by {}",
            after.id,
            after.status,
            reviewer.sub
        );

        // Step 3: Audit
        let action = match decision {
            ReviewDecision::Approve => AuditAction::PermissionApproved,
            ReviewDecision::Deny => AuditAction::PermissionDenied,
        };
        let mut outcome = ActionOutcome::new(after.clone());
        outcome.push(
            self.audit_logger
                .for_context(action, ctx)
                .details(format!(
                    "Permission {} request {} for {}",
                    after.status, after.id, after.permission
                ))
                .target("permission_requests", after.id.clone())
                .old_values(json!({ "status": before.status }))
                .new_values(json!({
                    "status": after.status,
                    "reviewer_id": after.reviewer_id,
                    "review_comments": after.review_comments,
                }))
                .record()
                .await,
        );

        // Step 4: Notify the requester if the account still exists
        match self.credential_store.find_by_id(&after.requester_id).await {
            Ok(Some(requester)) => outcome.push(
                dispatch(
                    self.notifier.as_ref(),
                    &Notification::PermissionReviewed {
                        to: requester.email,
                        username: requester.username,
                        permission: after.permission,
                        status: after.status,
                        comments: after.review_comments.clone(),
                    },
                )
                .await,
            ),
            Ok(None) => {
                tracing::debug!("Requester {} no longer exists", after.requester_id);
            }
            Err(e) => {
                tracing::error!("Failed to load requester for notification: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Page through all requests (SuperAdmin)
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: PermissionRequestFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Page<permission_request::Model>, InternalError> {
        require_role(ctx, SUPER_ADMIN_ONLY)?;
        self.page(&filter, page, page_size).await
    }

    /// Page through the caller's own requests
    pub async fn list_mine(
        &self,
        ctx: &RequestContext,
        page: u64,
        page_size: u64,
    ) -> Result<Page<permission_request::Model>, InternalError> {
        let filter = PermissionRequestFilter {
            status: None,
            requester_id: Some(require_user_id(ctx)?.to_string()),
        };
        self.page(&filter, page, page_size).await
    }

    /// One request, visible to SuperAdmins and to its requester
    pub async fn get(
        &self,
        ctx: &RequestContext,
        request_id: &str,
    ) -> Result<permission_request::Model, InternalError> {
        let caller = require_user_id(ctx)?;
        let request = self.permission_request_store.get(request_id).await?;

        if ctx.role() != Some(Role::SuperAdmin) && request.requester_id != caller {
            return Err(AuthorizationError::NotOwner(request_id.to_string()).into());
        }
        Ok(request)
    }

    async fn page(
        &self,
        filter: &PermissionRequestFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Page<permission_request::Model>, InternalError> {
        let page_size = clamp_page_size(page_size);
        let page = validate_page(page, page_size)?;
        let (items, total) = self
            .permission_request_store
            .list(filter, page, page_size)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::{authenticated_context, create_user, setup_test_app_data};
    use crate::types::internal::permission::RequestStatus;

    async fn setup() -> (PermissionCoordinator, RequestContext, RequestContext, Arc<crate::providers::InMemoryNotifier>) {
        let (app_data, notifier) = setup_test_app_data().await;
        let clerk = create_user(&app_data, "clerk", Role::DataEntry).await;
        let boss = create_user(&app_data, "boss", Role::SuperAdmin).await;

        (
            PermissionCoordinator::new(app_data),
            authenticated_context(&clerk.id, Role::DataEntry, true),
            authenticated_context(&boss.id, Role::SuperAdmin, true),
            notifier,
        )
    }

    #[tokio::test]
    async fn test_request_then_approve() {
        let (coordinator, clerk, boss, notifier) = setup().await;

        let created = coordinator
            .request(&clerk, Permission::ExportReports, "Quarterly report", None)
            .await
            .unwrap();
        assert!(created.side_effects_ok());
        assert_eq!(created.value.status, RequestStatus::Pending);

        let reviewed = coordinator
            .review(
                &boss,
                &created.value.id,
                ReviewDecision::Approve,
                Some("  ok  ".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(reviewed.value.status, RequestStatus::Approved);
        assert_eq!(reviewed.value.review_comments.as_deref(), Some("ok"));
        assert_eq!(reviewed.value.reviewer_id.as_deref(), boss.user_id());
        assert!(reviewed.side_effects_ok());

        assert!(notifier.sent().iter().any(|n| matches!(
            n,
            Notification::PermissionReviewed { status: RequestStatus::Approved, .. }
        )));
    }

    #[tokio::test]
    async fn test_review_errors() {
        let (coordinator, clerk, boss, _notifier) = setup().await;
        let created = coordinator
            .request(&clerk, Permission::ManageLoans, "Loan desk cover", None)
            .await
            .unwrap()
            .value;

        // Non-SuperAdmin
        let err = coordinator
            .review(&clerk, &created.id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Authorization(AuthorizationError::InsufficientRole { .. })
        ));

        // Unknown id
        let err = coordinator
            .review(&boss, "no-such-request", ReviewDecision::Deny, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::PermissionRequest(PermissionRequestError::NotFound(_))
        ));

        // Second review
        coordinator
            .review(&boss, &created.id, ReviewDecision::Approve, None)
            .await
            .unwrap();
        let err = coordinator
            .review(&boss, &created.id, ReviewDecision::Deny, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::PermissionRequest(PermissionRequestError::AlreadyReviewed {
                status: RequestStatus::Approved,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (coordinator, clerk, _boss, _notifier) = setup().await;

        let err = coordinator
            .request(&clerk, Permission::ManageUsers, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, InternalError::Validation { .. }));

        let err = coordinator
            .request(
                &clerk,
                Permission::ManageUsers,
                "For a colleague",
                Some("ghost".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::PermissionRequest(PermissionRequestError::TargetUserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_and_visibility() {
        let (coordinator, clerk, boss, _notifier) = setup().await;
        for reason in ["first", "second", "third"] {
            coordinator
                .request(&clerk, Permission::ManageGroups, reason, None)
                .await
                .unwrap();
        }
        let own = coordinator
            .request(&boss, Permission::ViewAuditLogs, "mine", None)
            .await
            .unwrap()
            .value;

        let page = coordinator
            .list(&boss, PermissionRequestFilter::default(), 1, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pages(), 2);

        assert!(coordinator
            .list(&clerk, PermissionRequestFilter::default(), 1, 20)
            .await
            .is_err());

        let mine = coordinator.list_mine(&clerk, 1, 20).await.unwrap();
        assert_eq!(mine.total, 3);

        let err = coordinator.get(&clerk, &own.id).await.unwrap_err();
        assert!(matches!(
            err,
            InternalError::Authorization(AuthorizationError::NotOwner(_))
        ));
        assert_eq!(coordinator.get(&boss, &own.id).await.unwrap().id, own.id);
    }
}
