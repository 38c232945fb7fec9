use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::errors::InternalError;
use crate::errors::internal::CredentialError;
use crate::types::db::user::{self, ActiveModel, Column, Entity as User};
use crate::types::internal::Role;

/// Fields of a user row at creation time
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<i64>,
}

/// Partial profile update. `None` leaves a column unchanged, an empty
/// string clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub phone_number: Option<String>,
    pub department: Option<String>,
    pub profile_picture: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none() && self.department.is_none() && self.profile_picture.is_none()
    }
}

/// Data access for user accounts
///
/// Every write is a single INSERT or UPDATE so concurrent requests touching
/// the same row cannot lose each other's changes. Uniqueness of username and
/// email is left to the database's unique indexes.
pub struct CredentialStore {
    db: DatabaseConnection,
}

impl CredentialStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<user::Model>, InternalError> {
        User::find_by_id(user_id.to_owned())
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_id", e))
    }

    /// Fetch a user by id, failing with `UserNotFound` when absent
    pub async fn get_user(&self, user_id: &str) -> Result<user::Model, InternalError> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| CredentialError::UserNotFound(user_id.to_string()).into())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, InternalError> {
        User::find()
            .filter(Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_username", e))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, InternalError> {
        User::find()
            .filter(Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_email", e))
    }

    pub async fn find_by_verification_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<user::Model>, InternalError> {
        User::find()
            .filter(Column::VerificationTokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_verification_token", e))
    }

    pub async fn find_by_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<user::Model>, InternalError> {
        User::find()
            .filter(Column::ResetTokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_user_by_reset_token", e))
    }

    /// Insert a new user
    ///
    /// # Errors
    /// * `CredentialError::DuplicateUsername` / `DuplicateEmail` when a unique index rejects the row
    pub async fn create_user(&self, new_user: NewUser) -> Result<user::Model, InternalError> {
        let now = Utc::now().timestamp();
        let username = new_user.username.clone();
        let email = new_user.email.clone();

        let model = ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            is_active: Set(true),
            phone_number: Set(None),
            department: Set(None),
            profile_picture: Set(None),
            email_verified: Set(new_user.email_verified),
            verification_token_hash: Set(new_user.verification_token_hash),
            verification_expires_at: Set(new_user.verification_expires_at),
            reset_token_hash: Set(None),
            reset_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model
            .insert(&self.db)
            .await
            .map_err(|e| Self::map_insert_error(e, username, email))
    }

    fn map_insert_error(err: DbErr, username: String, email: String) -> InternalError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                if detail.contains("email") {
                    CredentialError::DuplicateEmail(email).into()
                } else {
                    CredentialError::DuplicateUsername(username).into()
                }
            }
            _ => InternalError::database("create_user", err),
        }
    }

    /// Apply a partial profile update and return the updated row
    pub async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<user::Model, InternalError> {
        let mut query = User::update_many()
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id));

        if let Some(phone) = &update.phone_number {
            query = query.col_expr(Column::PhoneNumber, Expr::value(non_empty(phone)));
        }
        if let Some(department) = &update.department {
            query = query.col_expr(Column::Department, Expr::value(non_empty(department)));
        }
        if let Some(picture) = &update.profile_picture {
            query = query.col_expr(Column::ProfilePicture, Expr::value(non_empty(picture)));
        }

        let result = query
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("update_user", e))?;

        if result.rows_affected == 0 {
            return Err(CredentialError::UserNotFound(user_id.to_string()).into());
        }

        self.get_user(user_id).await
    }

    /// Store a new verification digest, replacing any previous one
    pub async fn set_verification_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<(), InternalError> {
        let result = User::update_many()
            .col_expr(Column::VerificationTokenHash, Expr::value(token_hash))
            .col_expr(Column::VerificationExpiresAt, Expr::value(expires_at))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("set_verification_token", e))?;

        Self::expect_row(result.rows_affected, user_id)
    }

    pub async fn clear_verification_token(&self, user_id: &str) -> Result<(), InternalError> {
        User::update_many()
            .col_expr(Column::VerificationTokenHash, Expr::value(Option::<String>::None))
            .col_expr(Column::VerificationExpiresAt, Expr::value(Option::<i64>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("clear_verification_token", e))?;
        Ok(())
    }

    /// Mark the email verified and clear the token, only if `token_hash` is
    /// still the stored digest
    ///
    /// # Returns
    /// * `Ok(true)` - this call consumed the token
    /// * `Ok(false)` - the token was already consumed or replaced
    pub async fn consume_verification_token(
        &self,
        user_id: &str,
        token_hash: &str,
    ) -> Result<bool, InternalError> {
        let result = User::update_many()
            .col_expr(Column::EmailVerified, Expr::value(true))
            .col_expr(Column::VerificationTokenHash, Expr::value(Option::<String>::None))
            .col_expr(Column::VerificationExpiresAt, Expr::value(Option::<i64>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .filter(Column::VerificationTokenHash.eq(token_hash))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("consume_verification_token", e))?;

        Ok(result.rows_affected == 1)
    }

    /// Store a new reset digest; any earlier reset token stops working
    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<(), InternalError> {
        let result = User::update_many()
            .col_expr(Column::ResetTokenHash, Expr::value(token_hash))
            .col_expr(Column::ResetExpiresAt, Expr::value(expires_at))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("set_reset_token", e))?;

        Self::expect_row(result.rows_affected, user_id)
    }

    pub async fn clear_reset_token(&self, user_id: &str) -> Result<(), InternalError> {
        User::update_many()
            .col_expr(Column::ResetTokenHash, Expr::value(Option::<String>::None))
            .col_expr(Column::ResetExpiresAt, Expr::value(Option::<i64>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("clear_reset_token", e))?;
        Ok(())
    }

    /// Replace the password hash. Any outstanding reset token is dropped.
    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), InternalError> {
        let result = User::update_many()
            .col_expr(Column::PasswordHash, Expr::value(password_hash))
            .col_expr(Column::ResetTokenHash, Expr::value(Option::<String>::None))
            .col_expr(Column::ResetExpiresAt, Expr::value(Option::<i64>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("set_password_hash", e))?;

        Self::expect_row(result.rows_affected, user_id)
    }

    /// Replace the password hash and clear the reset token, only if
    /// `token_hash` is still the stored reset digest
    ///
    /// # Returns
    /// * `Ok(true)` - password replaced
    /// * `Ok(false)` - the token was already used or replaced
    pub async fn reset_password(
        &self,
        user_id: &str,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, InternalError> {
        let result = User::update_many()
            .col_expr(Column::PasswordHash, Expr::value(password_hash))
            .col_expr(Column::ResetTokenHash, Expr::value(Option::<String>::None))
            .col_expr(Column::ResetExpiresAt, Expr::value(Option::<i64>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .filter(Column::ResetTokenHash.eq(token_hash))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("reset_password", e))?;

        Ok(result.rows_affected == 1)
    }

    pub async fn record_login(&self, user_id: &str, at: i64) -> Result<(), InternalError> {
        User::update_many()
            .col_expr(Column::LastLoginAt, Expr::value(at))
            .filter(Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("record_login", e))?;
        Ok(())
    }

    pub async fn count_active_super_admins(&self) -> Result<u64, InternalError> {
        User::find()
            .filter(Column::Role.eq(Role::SuperAdmin))
            .filter(Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(|e| InternalError::database("count_active_super_admins", e))
    }

    /// Change a user's role
    ///
    /// The active SuperAdmin rows are locked before the target is read, so
    /// concurrent demotions queue behind each other and the second one sees
    /// the first one's result.
    ///
    /// # Returns
    /// * `Ok((before, after))` - the row before and after the change
    /// * `Err(CredentialError::LastSuperAdmin)` - demoting the only active SuperAdmin
    pub async fn set_role(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<(user::Model, user::Model), InternalError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| InternalError::database("set_role_begin", e))?;

        let super_admins = Self::lock_active_super_admins(&txn).await?;
        let before = User::find_by_id(user_id.to_owned())
            .one(&txn)
            .await
            .map_err(|e| InternalError::database("set_role_find", e))?
            .ok_or_else(|| CredentialError::UserNotFound(user_id.to_string()))?;

        if role != Role::SuperAdmin {
            Self::ensure_not_last_super_admin(&super_admins, &before)?;
        }

        User::update_many()
            .col_expr(Column::Role, Expr::value(role.as_str()))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| InternalError::database("set_role", e))?;

        txn.commit()
            .await
            .map_err(|e| InternalError::database("set_role_commit", e))?;

        let after = self.get_user(user_id).await?;
        Ok((before, after))
    }

    /// Activate or deactivate a user; same last-SuperAdmin rule as `set_role`
    pub async fn set_active(
        &self,
        user_id: &str,
        is_active: bool,
    ) -> Result<(user::Model, user::Model), InternalError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| InternalError::database("set_active_begin", e))?;

        let super_admins = Self::lock_active_super_admins(&txn).await?;
        let before = User::find_by_id(user_id.to_owned())
            .one(&txn)
            .await
            .map_err(|e| InternalError::database("set_active_find", e))?
            .ok_or_else(|| CredentialError::UserNotFound(user_id.to_string()))?;

        if !is_active {
            Self::ensure_not_last_super_admin(&super_admins, &before)?;
        }

        User::update_many()
            .col_expr(Column::IsActive, Expr::value(is_active))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()))
            .filter(Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| InternalError::database("set_active", e))?;

        txn.commit()
            .await
            .map_err(|e| InternalError::database("set_active_commit", e))?;

        let after = self.get_user(user_id).await?;
        Ok((before, after))
    }

    /// Delete a user and return the removed row
    pub async fn delete_user(&self, user_id: &str) -> Result<user::Model, InternalError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| InternalError::database("delete_user_begin", e))?;

        let super_admins = Self::lock_active_super_admins(&txn).await?;
        let before = User::find_by_id(user_id.to_owned())
            .one(&txn)
            .await
            .map_err(|e| InternalError::database("delete_user_find", e))?
            .ok_or_else(|| CredentialError::UserNotFound(user_id.to_string()))?;

        Self::ensure_not_last_super_admin(&super_admins, &before)?;

        User::delete_by_id(user_id.to_owned())
            .exec(&txn)
            .await
            .map_err(|e| InternalError::database("delete_user", e))?;

        txn.commit()
            .await
            .map_err(|e| InternalError::database("delete_user_commit", e))?;

        Ok(before)
    }

    /// Active SuperAdmin rows, held `FOR UPDATE` until the transaction ends
    ///
    /// SQLite has no row locks; its single writer serialises the
    /// transactions instead.
    async fn lock_active_super_admins<C>(conn: &C) -> Result<Vec<user::Model>, InternalError>
    where
        C: ConnectionTrait,
    {
        User::find()
            .filter(Column::Role.eq(Role::SuperAdmin))
            .filter(Column::IsActive.eq(true))
            .order_by_asc(Column::Id)
            .lock_exclusive()
            .all(conn)
            .await
            .map_err(|e| InternalError::database("lock_active_super_admins", e))
    }

    fn ensure_not_last_super_admin(
        super_admins: &[user::Model],
        target: &user::Model,
    ) -> Result<(), InternalError> {
        let others = super_admins.iter().filter(|u| u.id != target.id).count();
        let is_super_admin = super_admins.iter().any(|u| u.id == target.id);

        if is_super_admin && others == 0 {
            return Err(CredentialError::LastSuperAdmin.into());
        }
        Ok(())
    }

    fn expect_row(rows_affected: u64, user_id: &str) -> Result<(), InternalError> {
        if rows_affected == 0 {
            return Err(CredentialError::UserNotFound(user_id.to_string()).into());
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("db", &"<connection>")
            .finish()
    }
}
