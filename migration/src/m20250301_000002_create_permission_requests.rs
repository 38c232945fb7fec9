use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PermissionRequests::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PermissionRequests::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(PermissionRequests::RequesterId).string().not_null())
                    .col(ColumnDef::new(PermissionRequests::TargetUserId).string())
                    .col(ColumnDef::new(PermissionRequests::Permission).string().not_null())
                    .col(ColumnDef::new(PermissionRequests::Reason).text().not_null())
                    .col(ColumnDef::new(PermissionRequests::Status).string().not_null())
                    .col(ColumnDef::new(PermissionRequests::ReviewerId).string())
                    .col(ColumnDef::new(PermissionRequests::ReviewComments).text())
                    .col(ColumnDef::new(PermissionRequests::ReviewedAt).big_integer())
                    .col(ColumnDef::new(PermissionRequests::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(PermissionRequests::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permission_requests_requester_id")
                    .table(PermissionRequests::Table)
                    .col(PermissionRequests::RequesterId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permission_requests_status")
                    .table(PermissionRequests::Table)
                    .col(PermissionRequests::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PermissionRequests::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum PermissionRequests {
    Table,
    Id,
    RequesterId,
    TargetUserId,
    Permission,
    Reason,
    Status,
    ReviewerId,
    ReviewComments,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}
