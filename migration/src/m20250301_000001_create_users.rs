use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(ColumnDef::new(Users::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Users::PhoneNumber).string())
                    .col(ColumnDef::new(Users::Department).string())
                    .col(ColumnDef::new(Users::ProfilePicture).string())
                    .col(ColumnDef::new(Users::EmailVerified).boolean().not_null().default(false))
                    .col(ColumnDef::new(Users::VerificationTokenHash).string())
                    .col(ColumnDef::new(Users::VerificationExpiresAt).big_integer())
                    .col(ColumnDef::new(Users::ResetTokenHash).string())
                    .col(ColumnDef::new(Users::ResetExpiresAt).big_integer())
                    .col(ColumnDef::new(Users::LastLoginAt).big_integer())
                    .col(ColumnDef::new(Users::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // One-time tokens are looked up by digest
        manager
            .create_index(
                Index::create()
                    .name("idx_users_verification_token_hash")
                    .table(Users::Table)
                    .col(Users::VerificationTokenHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_reset_token_hash")
                    .table(Users::Table)
                    .col(Users::ResetTokenHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_role")
                    .table(Users::Table)
                    .col(Users::Role)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    Role,
    IsActive,
    PhoneNumber,
    Department,
    ProfilePicture,
    EmailVerified,
    VerificationTokenHash,
    VerificationExpiresAt,
    ResetTokenHash,
    ResetExpiresAt,
    LastLoginAt,
    CreatedAt,
    UpdatedAt,
}
