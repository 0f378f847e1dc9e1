use sea_orm_migration::prelude::*;

use crate::m20261001_000001_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 deleted_shortened_links 归档表（短码不设唯一约束）
        manager
            .create_table(
                Table::create()
                    .table(DeletedShortenedLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::OriginalLink)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::ShortenedLink)
                            .string_len(10)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::RemoveAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeletedShortenedLinks::RemovedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deleted_shortened_links_user")
                            .from(DeletedShortenedLinks::Table, DeletedShortenedLinks::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deleted_links_user_removed")
                    .table(DeletedShortenedLinks::Table)
                    .col(DeletedShortenedLinks::UserId)
                    .col(DeletedShortenedLinks::RemovedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_deleted_links_user_removed").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DeletedShortenedLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeletedShortenedLinks {
    Table,
    Id,
    OriginalLink,
    ShortenedLink,
    CreatedAt,
    UpdatedAt,
    RemoveAt,
    IsActive,
    UserId,
    RemovedAt,
}
