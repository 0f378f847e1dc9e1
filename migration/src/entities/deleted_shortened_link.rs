//! Soft-deleted links waiting for restore or permanent purge

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "deleted_shortened_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub original_link: String,
    /// 归档中不要求唯一：同一短码可以被多次删除
    #[sea_orm(nullable)]
    pub shortened_link: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub remove_at: Option<DateTimeUtc>,
    pub is_active: bool,
    pub user_id: i64,
    pub removed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
