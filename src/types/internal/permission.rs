use std::fmt;

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

/// Capability a user can ask to be granted
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    poem_openapi::Enum,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[oai(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[sea_orm(string_value = "manage_users")]
    ManageUsers,
    #[sea_orm(string_value = "manage_programs")]
    ManagePrograms,
    #[sea_orm(string_value = "manage_beneficiaries")]
    ManageBeneficiaries,
    #[sea_orm(string_value = "manage_groups")]
    ManageGroups,
    #[sea_orm(string_value = "manage_loans")]
    ManageLoans,
    #[sea_orm(string_value = "export_reports")]
    ExportReports,
    #[sea_orm(string_value = "view_audit_logs")]
    ViewAuditLogs,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManagePrograms => "manage_programs",
            Permission::ManageBeneficiaries => "manage_beneficiaries",
            Permission::ManageGroups => "manage_groups",
            Permission::ManageLoans => "manage_loans",
            Permission::ExportReports => "export_reports",
            Permission::ViewAuditLogs => "view_audit_logs",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a permission request. Approved and Denied are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    poem_openapi::Enum,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[oai(rename_all = "PascalCase")]
pub enum RequestStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Denied")]
    Denied,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Denied => "Denied",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer's verdict on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, poem_openapi::Enum)]
#[oai(rename_all = "PascalCase")]
pub enum ReviewDecision {
    Approve,
    Deny,
}

impl ReviewDecision {
    /// Terminal status this decision moves a request into
    pub fn resulting_status(&self) -> RequestStatus {
        match self {
            ReviewDecision::Approve => RequestStatus::Approved,
            ReviewDecision::Deny => RequestStatus::Denied,
        }
    }
}
