use sea_orm::entity::prelude::*;

/// SeaORM entity for the append-only audit_logs table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub action: String,
    pub details: String,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    /// JSON snapshot before the change
    pub old_values: Option<String>,
    /// JSON snapshot after the change
    pub new_values: Option<String>,
    pub request_id: Option<String>,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
