use std::fmt;

/// Action labels written to the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAction {
    UserRegistered,
    EmailVerified,
    VerificationResent,
    VerificationTokenExpired,
    Login,
    LoginFailed,
    PasswordResetRequested,
    PasswordReset,
    ResetTokenExpired,
    PasswordChanged,
    ProfileUpdated,
    PermissionRequested,
    PermissionApproved,
    PermissionDenied,
    RoleChanged,
    UserActivated,
    UserDeactivated,
    UserDeleted,
    SuperAdminCreated,
    AuditLogsExported,
    Custom(String),
}

impl AuditAction {
    /// String stored in the `action` column
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserRegistered => "USER_REGISTERED",
            Self::EmailVerified => "EMAIL_VERIFIED",
            Self::VerificationResent => "VERIFICATION_RESENT",
            Self::VerificationTokenExpired => "VERIFICATION_TOKEN_EXPIRED",
            Self::Login => "LOGIN",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            Self::PasswordReset => "PASSWORD_RESET",
            Self::ResetTokenExpired => "RESET_TOKEN_EXPIRED",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::ProfileUpdated => "PROFILE_UPDATED",
            Self::PermissionRequested => "PERMISSION_REQUESTED",
            Self::PermissionApproved => "PERMISSION_APPROVED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::RoleChanged => "ROLE_CHANGED",
            Self::UserActivated => "USER_ACTIVATED",
            Self::UserDeactivated => "USER_DEACTIVATED",
            Self::UserDeleted => "USER_DELETED",
            Self::SuperAdminCreated => "SUPER_ADMIN_CREATED",
            Self::AuditLogsExported => "AUDIT_LOGS_EXPORTED",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for AuditAction {
    fn from(s: &str) -> Self {
        AuditAction::Custom(s.to_string())
    }
}

impl From<String> for AuditAction {
    fn from(s: String) -> Self {
        AuditAction::Custom(s)
    }
}

/// Audit entry ready to be appended
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub details: String,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub request_id: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            details: String::new(),
            actor_id: None,
            ip_address: None,
            table_name: None,
            record_id: None,
            old_values: None,
            new_values: None,
            request_id: None,
        }
    }
}

/// Conjunctive filter for listing and exporting audit entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    /// Substring match against action or details
    pub search: Option<String>,
    /// Exact action label
    pub action: Option<String>,
    /// Actor id
    pub user: Option<String>,
    /// Inclusive lower bound (unix seconds)
    pub from: Option<i64>,
    /// Exclusive upper bound (unix seconds)
    pub to: Option<i64>,
}

/// Export encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, poem_openapi::Enum)]
#[oai(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}
