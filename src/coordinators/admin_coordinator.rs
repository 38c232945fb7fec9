use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::app_data::AppData;
use crate::audit::AuditLogger;
use crate::coordinators::auth_coordinator::{validate_email, validate_username};
use crate::coordinators::{Page, require_role};
use crate::errors::InternalError;
use crate::errors::internal::AuditError;
use crate::providers::CryptoProvider;
use crate::stores::audit_store::{clamp_page_size, validate_page};
use crate::stores::{AuditStore, CredentialStore, NewUser};
use crate::types::CoordinatorResult;
use crate::types::db::{audit_log, user};
use crate::types::dto::admin::AuditLogItem;
use crate::types::dto::auth::UserProfile;
use crate::types::internal::action_outcome::ActionOutcome;
use crate::types::internal::audit::{AuditAction, AuditFilter, ExportFormat};
use crate::types::internal::context::RequestContext;
use crate::types::internal::role::{ADMINISTRATORS, AUDIT_READERS, Role, SUPER_ADMIN_ONLY};

const CSV_HEADER: [&str; 11] = [
    "id",
    "created_at",
    "action",
    "details",
    "actor_id",
    "ip_address",
    "table_name",
    "record_id",
    "old_values",
    "new_values",
    "request_id",
];

/// Rendered audit export
#[derive(Debug, Clone)]
pub struct AuditExport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub rows: usize,
}

/// Result of bootstrapping a SuperAdmin from the CLI
///
/// The generated password is shown once and never stored in plaintext.
pub struct SuperAdminCredentials {
    pub user: UserProfile,
    pub password: String,
}

/// Admin coordinator: audit log reading and user administration
///
/// Role changes, activation and deletion never leave the system without an
/// active SuperAdmin. Tokens already issued keep their role until they
/// expire.
pub struct AdminCoordinator {
    credential_store: Arc<CredentialStore>,
    audit_store: Arc<AuditStore>,
    crypto: Arc<CryptoProvider>,
    audit_logger: Arc<AuditLogger>,
}

impl AdminCoordinator {
    pub fn new(app_data: Arc<AppData>) -> Self {
        Self {
            credential_store: app_data.credential_store.clone(),
            audit_store: app_data.audit_store.clone(),
            crypto: app_data.crypto.clone(),
            audit_logger: app_data.audit_logger.clone(),
        }
    }

    /// Page through the audit log, newest first
    pub async fn list_audit_logs(
        &self,
        ctx: &RequestContext,
        filter: AuditFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Page<audit_log::Model>, InternalError> {
        require_role(ctx, AUDIT_READERS)?;

        let page_size = clamp_page_size(page_size);
        let page = validate_page(page, page_size)?;
        let (items, total) = self.audit_store.list(&filter, page, page_size).await?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Render every matching entry as CSV or JSON
    ///
    /// The export itself is audited.
    pub async fn export_audit_logs(
        &self,
        ctx: &RequestContext,
        filter: AuditFilter,
        format: ExportFormat,
    ) -> CoordinatorResult<AuditExport> {
        require_role(ctx, AUDIT_READERS)?;

        let rows = self.audit_store.export(&filter).await?;
        let bytes = match format {
            ExportFormat::Csv => render_csv(&rows),
            ExportFormat::Json => render_json(&rows)?,
        };

        let export = AuditExport {
            bytes,
            content_type: format.content_type(),
            filename: format!(
                "audit-logs-{}.{}",
                Utc::now().format("%Y%m%d%H%M%S"),
                format.extension()
            ),
            rows: rows.len(),
        };

        tracing::info!("{} audit rows exported by {}", export.rows, ctx.actor_id);

        let report = self
            .audit_logger
            .for_context(AuditAction::AuditLogsExported, ctx)
            .details(format!("Exported {} audit entries", export.rows))
            .add_field("format", format.extension())
            .add_field("rows", export.rows)
            .add_field(
                "filter",
                json!({
                    "search": filter.search,
                    "action": filter.action,
                    "user": filter.user,
                    "from": filter.from,
                    "to": filter.to,
                }),
            )
            .record()
            .await;

        Ok(ActionOutcome::new(export).with_report(report))
    }

    /// Look up one account (SuperAdmin, Admin)
    pub async fn get_user(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<UserProfile, InternalError> {
        require_role(ctx, ADMINISTRATORS)?;
        let user = self.credential_store.get_user(user_id).await?;
        Ok(UserProfile::from(user))
    }

    /// Change a user's role (SuperAdmin)
    ///
    /// # Returns
    /// * `Err(CredentialError::LastSuperAdmin)` - would demote the only active SuperAdmin
    /// * `Err(CredentialError::UserNotFound)` - unknown user
    pub async fn set_user_role(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        role: Role,
    ) -> CoordinatorResult<UserProfile> {
        require_role(ctx, SUPER_ADMIN_ONLY)?;

        let (before, after) = self.credential_store.set_role(user_id, role).await?;
        tracing::info!(
            "Role of user {} changed from {} to {} by {}",
            after.id,
            before.role,
            after.role,
            ctx.actor_id
        );

        let report = self
            .audit_logger
            .for_context(AuditAction::RoleChanged, ctx)
            .details(format!(
                "Role of {} changed from {} to {}",
                after.username, before.role, after.role
            ))
            .target("users", after.id.clone())
            .old_values(json!({ "role": before.role }))
            .new_values(json!({ "role": after.role }))
            .record()
            .await;

        Ok(ActionOutcome::new(UserProfile::from(after)).with_report(report))
    }

    /// Activate or deactivate a user (SuperAdmin)
    pub async fn set_user_active(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        is_active: bool,
    ) -> CoordinatorResult<UserProfile> {
        require_role(ctx, SUPER_ADMIN_ONLY)?;

        let (before, after) = self.credential_store.set_active(user_id, is_active).await?;

        let action = if is_active {
            AuditAction::UserActivated
        } else {
            AuditAction::UserDeactivated
        };
        let report = self
            .audit_logger
            .for_context(action, ctx)
            .details(format!(
                "User {} {}",
                after.username,
                if is_active { "activated" } else { "deactivated" }
            ))
            .target("users", after.id.clone())
            .old_values(json!({ "is_active": before.is_active }))
            .new_values(json!({ "is_active": after.is_active }))
            .record()
            .await;

        Ok(ActionOutcome::new(UserProfile::from(after)).with_report(report))
    }

    /// Delete a user (SuperAdmin)
    pub async fn delete_user(&self, ctx: &RequestContext, user_id: &str) -> CoordinatorResult<()> {
        require_role(ctx, SUPER_ADMIN_ONLY)?;

        let removed = self.credential_store.delete_user(user_id).await?;
        tracing::info!("User {} deleted by {}", removed.id, ctx.actor_id);

        let report = self
            .audit_logger
            .for_context(AuditAction::UserDeleted, ctx)
            .details(format!("User {} deleted", removed.username))
            .target("users", removed.id.clone())
            .old_values(account_snapshot(&removed))
            .record()
            .await;

        Ok(ActionOutcome::new(()).with_report(report))
    }

    /// Create a verified SuperAdmin with a generated password
    ///
    /// Used by the `create-super-admin` command; the context is a CLI context
    /// so no role check applies.
    pub async fn create_super_admin(
        &self,
        ctx: &RequestContext,
        username: &str,
        email: &str,
    ) -> CoordinatorResult<SuperAdminCredentials> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;

        let password = self.crypto.generate_secure_password();
        let password_hash = self.crypto.hash_password(&password)?;

        let user = self
            .credential_store
            .create_user(NewUser {
                username,
                email,
                password_hash,
                role: Role::SuperAdmin,
                email_verified: true,
                verification_token_hash: None,
                verification_expires_at: None,
            })
            .await?;

        tracing::info!("SuperAdmin {} created by {}", user.id, ctx.actor_id);

        let report = self
            .audit_logger
            .for_context(AuditAction::SuperAdminCreated, ctx)
            .details(format!("SuperAdmin {} created", user.username))
            .target("users", user.id.clone())
            .new_values(account_snapshot(&user))
            .record()
            .await;

        Ok(ActionOutcome::new(SuperAdminCredentials {
            user: UserProfile::from(user),
            password,
        })
        .with_report(report))
    }
}

fn account_snapshot(user: &user::Model) -> serde_json::Value {
    json!({
        "username": user.username,
        "email": user.email,
        "role": user.role,
        "is_active": user.is_active,
    })
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

/// Quote a field per RFC 4180 when it holds a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(rows: &[audit_log::Model]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push_str("\r\n");

    for row in rows {
        let fields = [
            row.id.to_string(),
            format_timestamp(row.created_at),
            row.action.clone(),
            row.details.clone(),
            row.actor_id.clone().unwrap_or_default(),
            row.ip_address.clone().unwrap_or_default(),
            row.table_name.clone().unwrap_or_default(),
            row.record_id.clone().unwrap_or_default(),
            row.old_values.clone().unwrap_or_default(),
            row.new_values.clone().unwrap_or_default(),
            row.request_id.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }

    out.into_bytes()
}

fn render_json(rows: &[audit_log::Model]) -> Result<Vec<u8>, InternalError> {
    let items: Vec<AuditLogItem> = rows.iter().cloned().map(AuditLogItem::from).collect();
    serde_json::to_vec_pretty(&items)
        .map_err(|e| AuditError::ExportFailed(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::internal::{AuthorizationError, CredentialError};
    use crate::test::utils::{authenticated_context, create_user, setup_test_app_data};

    fn row(id: i64, details: &str) -> audit_log::Model {
        audit_log::Model {
            id,
            action: "LOGIN".to_string(),
            details: details.to_string(),
            actor_id: Some("user-1".to_string()),
            ip_address: None,
            table_name: None,
            record_id: None,
            old_values: None,
            new_values: Some(r#"{"role":"Admin"}"#.to_string()),
            request_id: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_csv_quotes_per_rfc4180() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_render_csv() {
        let csv = String::from_utf8(render_csv(&[row(7, "User a, logged in")])).unwrap();
        let mut lines = csv.split("\r\n");

        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "7,1970-01-01T00:00:00+00:00,LOGIN,\"User a, logged in\",user-1,,,,,\"{\"\"role\"\":\"\"Admin\"\"}\","
        );
        assert_eq!(lines.next(), Some(""));
    }

    #[test]
    fn test_render_json_parses_snapshots() {
        let json = render_json(&[row(1, "x")]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value[0]["id"], 1);
        assert_eq!(value[0]["new_values"]["role"], "Admin");
        assert!(value[0]["old_values"].is_null());
    }

    #[tokio::test]
    async fn test_last_super_admin_is_protected() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let boss = create_user(&app_data, "boss", Role::SuperAdmin).await;
        let coordinator = AdminCoordinator::new(app_data);
        let ctx = authenticated_context(&boss.id, Role::SuperAdmin, true);

        for result in [
            coordinator.set_user_role(&ctx, &boss.id, Role::Admin).await.map(|_| ()),
            coordinator.set_user_active(&ctx, &boss.id, false).await.map(|_| ()),
            coordinator.delete_user(&ctx, &boss.id).await.map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(InternalError::Credential(CredentialError::LastSuperAdmin))
            ));
        }
    }

    #[tokio::test]
    async fn test_role_change_is_audited_with_snapshots() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let boss = create_user(&app_data, "boss", Role::SuperAdmin).await;
        let clerk = create_user(&app_data, "clerk", Role::DataEntry).await;
        let coordinator = AdminCoordinator::new(app_data);
        let ctx = authenticated_context(&boss.id, Role::SuperAdmin, true);

        let outcome = coordinator
            .set_user_role(&ctx, &clerk.id, Role::Auditor)
            .await
            .unwrap();
        assert_eq!(outcome.value.role, Role::Auditor);
        assert!(outcome.side_effects_ok());

        let page = coordinator
            .list_audit_logs(
                &ctx,
                AuditFilter {
                    action: Some("ROLE_CHANGED".to_string()),
                    ..Default::default()
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let entry = &page.items[0];
        assert_eq!(entry.record_id.as_deref(), Some(clerk.id.as_str()));
        assert_eq!(entry.old_values.as_deref(), Some(r#"{"role":"DataEntry"}"#));
        assert_eq!(entry.new_values.as_deref(), Some(r#"{"role":"Auditor"}"#));
    }

    #[tokio::test]
    async fn test_admin_cannot_change_roles() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let admin = create_user(&app_data, "admin", Role::Admin).await;
        let clerk = create_user(&app_data, "clerk", Role::DataEntry).await;
        let coordinator = AdminCoordinator::new(app_data);
        let ctx = authenticated_context(&admin.id, Role::Admin, true);

        let err = coordinator
            .set_user_role(&ctx, &clerk.id, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Authorization(AuthorizationError::InsufficientRole { .. })
        ));

        // Admins can still read the audit log
        assert!(coordinator
            .list_audit_logs(&ctx, AuditFilter::default(), 1, 20)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_data_entry_cannot_read_audit_log() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let clerk = create_user(&app_data, "clerk", Role::DataEntry).await;
        let coordinator = AdminCoordinator::new(app_data);
        let ctx = authenticated_context(&clerk.id, Role::DataEntry, true);

        assert!(coordinator
            .export_audit_logs(&ctx, AuditFilter::default(), ExportFormat::Csv)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_get_user_requires_administrator() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let admin = create_user(&app_data, "admin", Role::Admin).await;
        let auditor = create_user(&app_data, "auditor", Role::Auditor).await;
        let coordinator = AdminCoordinator::new(app_data);

        let profile = coordinator
            .get_user(&authenticated_context(&admin.id, Role::Admin, true), &auditor.id)
            .await
            .unwrap();
        assert_eq!(profile.username, "auditor");

        let err = coordinator
            .get_user(&authenticated_context(&auditor.id, Role::Auditor, true), &admin.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InternalError::Authorization(AuthorizationError::InsufficientRole { .. })
        ));
    }

    #[tokio::test]
    async fn test_export_is_recorded() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let auditor = create_user(&app_data, "auditor", Role::Auditor).await;
        let coordinator = AdminCoordinator::new(app_data);
        let ctx = authenticated_context(&auditor.id, Role::Auditor, true);

        let first = coordinator
            .export_audit_logs(&ctx, AuditFilter::default(), ExportFormat::Json)
            .await
            .unwrap();
        assert_eq!(first.value.rows, 0);
        assert_eq!(first.value.content_type, "application/json");
        assert!(first.value.filename.ends_with(".json"));

        let second = coordinator
            .export_audit_logs(&ctx, AuditFilter::default(), ExportFormat::Csv)
            .await
            .unwrap();
        assert_eq!(second.value.rows, 1);
    }

    #[tokio::test]
    async fn test_create_super_admin_is_verified() {
        let (app_data, _notifier) = setup_test_app_data().await;
        let coordinator = AdminCoordinator::new(app_data.clone());

        let outcome = coordinator
            .create_super_admin(&RequestContext::for_cli("create-super-admin"), "root", "root@council.local")
            .await
            .unwrap();

        let creds = outcome.value;
        assert_eq!(creds.user.role, Role::SuperAdmin);
        assert!(creds.user.email_verified);
        assert_eq!(creds.password.len(), 20);

        let stored = app_data.credential_store.get_user(&creds.user.id).await.unwrap();
        assert!(app_data
            .crypto
            .verify_password(&creds.password, &stored.password_hash)
            .unwrap());
    }
}
