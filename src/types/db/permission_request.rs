use sea_orm::entity::prelude::*;

use crate::types::internal::permission::{Permission, RequestStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "permission_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
