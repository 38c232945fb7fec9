use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use poem::Request;
use poem_openapi::{
    OpenApi, Tags,
    param::{Path, Query},
    payload::{Binary, Json, Response},
};

use crate::api::guard::{ADMINISTRATORS, AUDIT_READERS, AccessGuard, SUPER_ADMIN_ONLY};
use crate::coordinators::AdminCoordinator;
use crate::errors::{ApiError, InternalError};
use crate::types::dto::admin::{AuditLogItem, AuditLogPage, SetActiveRequest, SetRoleRequest};
use crate::types::dto::auth::UserProfile;
use crate::types::dto::common::MessageResponse;
use crate::types::internal::audit::{AuditFilter, ExportFormat};

const DAY_SECONDS: i64 = 86_400;

/// Audit log and user administration endpoints
pub struct AdminApi {
    coordinator: Arc<AdminCoordinator>,
    guard: AccessGuard,
}

impl AdminApi {
    pub fn new(coordinator: Arc<AdminCoordinator>, guard: AccessGuard) -> Self {
        Self { coordinator, guard }
    }
}

/// API tags for admin endpoints
#[derive(Tags)]
enum AdminTags {
    /// Audit log access
    Audit,
    /// User administration
    Users,
}

/// Parse a query bound given as RFC 3339 or as a bare `YYYY-MM-DD` date
///
/// Returns the instant in unix seconds and whether the input was a bare date.
fn parse_instant(raw: &str) -> Option<(i64, bool)> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.timestamp(), false));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| (dt.and_utc().timestamp(), true))
}

fn bound(field: &str, raw: Option<&str>) -> Result<Option<(i64, bool)>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_instant(raw).map(Some).ok_or_else(|| {
            ApiError::from_internal_error(InternalError::validation(
                field,
                "Expected an RFC 3339 timestamp or a YYYY-MM-DD date",
            ))
        }),
    }
}

/// Build the audit filter from query parameters
///
/// `date` selects one UTC day. A bare date in `to` includes that whole day.
/// When `date` and `from`/`to` are combined the narrower window wins.
fn audit_filter(
    search: Option<String>,
    action: Option<String>,
    user: Option<String>,
    date: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<AuditFilter, ApiError> {
    let mut lower = bound("from", from)?.map(|(at, _)| at);
    let mut upper = bound("to", to)?.map(|(at, is_date)| if is_date { at + DAY_SECONDS } else { at });

    if let Some((day, _)) = bound("date", date)? {
        lower = Some(lower.map_or(day, |at| at.max(day)));
        upper = Some(upper.map_or(day + DAY_SECONDS, |at| at.min(day + DAY_SECONDS)));
    }

    Ok(AuditFilter {
        search: text_filter(search),
        action: text_filter(action),
        user: text_filter(user),
        from: lower,
        to: upper,
    })
}

fn text_filter(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[OpenApi(prefix_path = "/admin")]
impl AdminApi {
    /// Search the audit log, newest first
    #[oai(path = "/audit-logs", method = "get", tag = "AdminTags::Audit")]
    #[allow(clippy::too_many_arguments)]
    async fn list_audit_logs(
        &self,
        req: &Request,
        search: Query<Option<String>>,
        action: Query<Option<String>>,
        user: Query<Option<String>>,
        date: Query<Option<String>>,
        from: Query<Option<String>>,
        to: Query<Option<String>>,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
    ) -> Result<Json<AuditLogPage>, ApiError> {
        let ctx = self.guard.require(req, AUDIT_READERS)?;
        let filter = audit_filter(
            search.0,
            action.0,
            user.0,
            date.0.as_deref(),
            from.0.as_deref(),
            to.0.as_deref(),
        )?;

        let result = self
            .coordinator
            .list_audit_logs(&ctx, filter, page.0.unwrap_or(1), limit.0.unwrap_or(0))
            .await?;

        let pages = result.pages();
        let result = result.map(AuditLogItem::from);
        Ok(Json(AuditLogPage {
            items: result.items,
            total: result.total,
            pages,
            page: result.page,
        }))
    }

    /// Download matching audit entries as CSV or JSON
    #[oai(path = "/audit-logs/export", method = "get", tag = "AdminTags::Audit")]
    #[allow(clippy::too_many_arguments)]
    async fn export_audit_logs(
        &self,
        req: &Request,
        format: Query<Option<ExportFormat>>,
        search: Query<Option<String>>,
        action: Query<Option<String>>,
        user: Query<Option<String>>,
        date: Query<Option<String>>,
        from: Query<Option<String>>,
        to: Query<Option<String>>,
    ) -> Result<Response<Binary<Vec<u8>>>, ApiError> {
        let ctx = self.guard.require(req, AUDIT_READERS)?;
        let filter = audit_filter(
            search.0,
            action.0,
            user.0,
            date.0.as_deref(),
            from.0.as_deref(),
            to.0.as_deref(),
        )?;

        let export = self
            .coordinator
            .export_audit_logs(&ctx, filter, format.0.unwrap_or(ExportFormat::Csv))
            .await?
            .into_value();

        Ok(Response::new(Binary(export.bytes))
            .header("Content-Type", export.content_type)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", export.filename),
            ))
    }

    /// Fetch one account (SuperAdmin, Admin)
    #[oai(path = "/users/:id", method = "get", tag = "AdminTags::Users")]
    async fn get_user(&self, req: &Request, id: Path<String>) -> Result<Json<UserProfile>, ApiError> {
        let ctx = self.guard.require(req, ADMINISTRATORS)?;
        Ok(Json(self.coordinator.get_user(&ctx, &id.0).await?))
    }

    /// Change a user's role (SuperAdmin)
    #[oai(path = "/users/:id/role", method = "put", tag = "AdminTags::Users")]
    async fn set_role(
        &self,
        req: &Request,
        id: Path<String>,
        body: Json<SetRoleRequest>,
    ) -> Result<Json<UserProfile>, ApiError> {
        let ctx = self.guard.require(req, SUPER_ADMIN_ONLY)?;
        let outcome = self.coordinator.set_user_role(&ctx, &id.0, body.role).await?;
        Ok(Json(outcome.into_value()))
    }

    /// Activate or deactivate a user (SuperAdmin)
    #[oai(path = "/users/:id/active", method = "put", tag = "AdminTags::Users")]
    async fn set_active(
        &self,
        req: &Request,
        id: Path<String>,
        body: Json<SetActiveRequest>,
    ) -> Result<Json<UserProfile>, ApiError> {
        let ctx = self.guard.require(req, SUPER_ADMIN_ONLY)?;
        let outcome = self
            .coordinator
            .set_user_active(&ctx, &id.0, body.is_active)
            .await?;
        Ok(Json(outcome.into_value()))
    }

    /// Delete a user (SuperAdmin)
    #[oai(path = "/users/:id", method = "delete", tag = "AdminTags::Users")]
    async fn delete_user(
        &self,
        req: &Request,
        id: Path<String>,
    ) -> Result<Json<MessageResponse>, ApiError> {
        let ctx = self.guard.require(req, SUPER_ADMIN_ONLY)?;
        self.coordinator.delete_user(&ctx, &id.0).await?;
        Ok(Json(MessageResponse::ok("User deleted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARCH_FIRST: i64 = 1_709_251_200;

    #[test]
    fn test_parse_instant() {
        assert_eq!(parse_instant("2024-03-01"), Some((MARCH_FIRST, true)));
        assert_eq!(
            parse_instant("2024-03-01T01:00:00Z"),
            Some((MARCH_FIRST + 3600, false))
        );
        assert_eq!(parse_instant("2024-03-01T02:00:00+01:00"), Some((MARCH_FIRST + 3600, false)));
        assert_eq!(parse_instant("yesterday"), None);
    }

    #[test]
    fn test_date_selects_one_day() {
        let filter = audit_filter(None, None, None, Some("2024-03-01"), None, None).unwrap();
        assert_eq!(filter.from, Some(MARCH_FIRST));
        assert_eq!(filter.to, Some(MARCH_FIRST + DAY_SECONDS));
    }

    #[test]
    fn test_bare_date_upper_bound_includes_day() {
        let filter = audit_filter(None, None, None, None, Some("2024-02-28"), Some("2024-03-01")).unwrap();
        assert_eq!(filter.from, Some(MARCH_FIRST - 2 * DAY_SECONDS));
        assert_eq!(filter.to, Some(MARCH_FIRST + DAY_SECONDS));
    }

    #[test]
    fn test_date_and_range_take_narrower_window() {
        let filter = audit_filter(
            None,
            None,
            None,
            Some("2024-03-01"),
            Some("2024-03-01T12:00:00Z"),
            Some("2024-03-05"),
        )
        .unwrap();
        assert_eq!(filter.from, Some(MARCH_FIRST + 12 * 3600));
        assert_eq!(filter.to, Some(MARCH_FIRST + DAY_SECONDS));
    }

    #[test]
    fn test_blank_text_filters_are_dropped() {
        let filter = audit_filter(
            Some("  ".to_string()),
            Some("LOGIN".to_string()),
            None,
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(filter.search, None);
        assert_eq!(filter.action.as_deref(), Some("LOGIN"));
    }

    #[test]
    fn test_text_filters_are_trimmed() {
        let filter = audit_filter(
            Some(" clerk ".to_string()),
            Some(" LOGIN ".to_string()),
            Some("\tuser-1\n".to_string()),
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(filter.search.as_deref(), Some("clerk"));
        assert_eq!(filter.action.as_deref(), Some("LOGIN"));
        assert_eq!(filter.user.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_unparseable_bound_is_rejected() {
        let err = audit_filter(None, None, None, None, Some("soon"), None).unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
