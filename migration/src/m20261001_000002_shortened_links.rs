use sea_orm_migration::prelude::*;

use crate::m20261001_000001_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 shortened_links 表
        manager
            .create_table(
                Table::create()
                    .table(ShortenedLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShortenedLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::OriginalLink)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::ShortenedLink)
                            .string_len(10)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::RemoveAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShortenedLinks::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shortened_links_user")
                            .from(ShortenedLinks::Table, ShortenedLinks::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 过期扫描索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shortened_links_remove_at")
                    .table(ShortenedLinks::Table)
                    .col(ShortenedLinks::RemoveAt)
                    .to_owned(),
            )
            .await?;

        // 按用户统计配额 / 淘汰排序
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shortened_links_user_updated")
                    .table(ShortenedLinks::Table)
                    .col(ShortenedLinks::UserId)
                    .col(ShortenedLinks::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_shortened_links_user_updated")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_shortened_links_remove_at").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ShortenedLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ShortenedLinks {
    Table,
    Id,
    OriginalLink,
    ShortenedLink,
    CreatedAt,
    UpdatedAt,
    RemoveAt,
    IsActive,
    UserId,
}
