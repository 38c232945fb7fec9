use sea_orm::entity::prelude::*;

use crate::types::internal::role::Role;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,

    // Profile
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub profile_picture: Option<String>,

    // Email verification (token stored as HMAC digest)
    pub email_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<i64>,

    // Password reset (token stored as HMAC digest)
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<i64>,

    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
