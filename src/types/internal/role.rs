use std::fmt;
use std::str::FromStr;

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

/// Capability tier determining which routes a user may reach
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    poem_openapi::Enum,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[oai(rename_all = "PascalCase")]
pub enum Role {
    #[sea_orm(string_value = "SuperAdmin")]
    SuperAdmin,
    #[sea_orm(string_value = "Admin")]
    Admin,
    #[sea_orm(string_value = "DataEntry")]
    DataEntry,
    #[sea_orm(string_value = "Auditor")]
    Auditor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::DataEntry, Role::Auditor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::DataEntry => "DataEntry",
            Role::Auditor => "Auditor",
        }
    }
}

/// Route allow-lists
pub const SUPER_ADMIN_ONLY: &[Role] = &[Role::SuperAdmin];
pub const ADMINISTRATORS: &[Role] = &[Role::SuperAdmin, Role::Admin];
pub const AUDIT_READERS: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Auditor];
pub const ANY_ROLE: &[Role] = &Role::ALL;

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}
