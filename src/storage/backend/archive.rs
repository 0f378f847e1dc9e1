//! Soft-delete archive operations for SeaOrmStorage

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::info;

use super::converters::{fields_to_archived_active_model, fields_to_link_active_model, model_to_archived, model_to_link};
use super::{SeaOrmStorage, is_unique_violation, map_lifecycle_err, retry};
use crate::errors::{LinkError, Result};
use crate::storage::models::{ArchivedLink, LinkFields, ShortenedLink};

use migration::entities::deleted_shortened_link;

impl SeaOrmStorage {
    /// 直接写入一条归档记录（导入历史数据时使用）
    pub async fn insert_archived(
        &self,
        fields: &LinkFields,
        removed_at: DateTime<Utc>,
    ) -> Result<ArchivedLink> {
        let model = fields_to_archived_active_model(fields, removed_at)
            .insert(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("写入归档失败: {}", e)))?;

        Ok(model_to_archived(model))
    }

    pub async fn get_archived(&self, id: i64) -> Result<Option<ArchivedLink>> {
        let db = &self.db;

        retry::with_retry(&format!("get_archived({})", id), self.retry_config, || async {
            deleted_shortened_link::Entity::find_by_id(id).one(db).await
        })
        .await
        .map(|model| model.map(model_to_archived))
        .map_err(|e| LinkError::database_operation(format!("查询归档失败: {}", e)))
    }

    pub async fn get_archived_for_user(
        &self,
        user_id: i64,
        id: i64,
    ) -> Result<Option<ArchivedLink>> {
        Ok(self
            .get_archived(id)
            .await?
            .filter(|archived| archived.fields.user_id == user_id))
    }

    /// 同一短码可能被归档多次，返回最近一次
    pub async fn get_archived_by_code(
        &self,
        user_id: i64,
        code: &str,
    ) -> Result<Option<ArchivedLink>> {
        deleted_shortened_link::Entity::find()
            .filter(deleted_shortened_link::Column::UserId.eq(user_id))
            .filter(deleted_shortened_link::Column::ShortenedLink.eq(code))
            .order_by_desc(deleted_shortened_link::Column::RemovedAt)
            .order_by_desc(deleted_shortened_link::Column::Id)
            .one(&self.db)
            .await
            .map(|model| model.map(model_to_archived))
            .map_err(|e| LinkError::database_operation(format!("按短码查询归档失败: {}", e)))
    }

    /// 用户的归档链接，最近删除的在前
    pub async fn list_archived(&self, user_id: i64) -> Result<Vec<ArchivedLink>> {
        let models = deleted_shortened_link::Entity::find()
            .filter(deleted_shortened_link::Column::UserId.eq(user_id))
            .order_by_desc(deleted_shortened_link::Column::RemovedAt)
            .order_by_desc(deleted_shortened_link::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("加载归档列表失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_archived).collect())
    }

    /// removed_at <= cutoff 的归档，最早删除的在前
    pub async fn list_archived_removed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ArchivedLink>> {
        let models = deleted_shortened_link::Entity::find()
            .filter(deleted_shortened_link::Column::RemovedAt.lte(cutoff))
            .order_by_asc(deleted_shortened_link::Column::RemovedAt)
            .order_by_asc(deleted_shortened_link::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("加载归档列表失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_archived).collect())
    }

    /// 恢复归档：在同一事务内删除归档行并插入新的活动行
    ///
    /// 短码已被占用时返回 DuplicateCode，事务整体回滚，归档行保留。
    pub async fn restore_archived(
        &self,
        archived_id: i64,
        owner: i64,
        fields: &LinkFields,
        attempts: u32,
    ) -> Result<ShortenedLink> {
        let db = &self.db;
        let config = self.retry_config.with_attempts(attempts);
        let operation_name = format!("restore_archived({})", archived_id);

        let result = retry::with_retry_if(
            &operation_name,
            config,
            retry::is_retryable_error,
            || async move {
                let txn = db.begin().await?;

                let deleted = deleted_shortened_link::Entity::delete_many()
                    .filter(deleted_shortened_link::Column::Id.eq(archived_id))
                    .filter(deleted_shortened_link::Column::UserId.eq(owner))
                    .exec(&txn)
                    .await?;
                if deleted.rows_affected == 0 {
                    return Err(DbErr::RecordNotFound(format!(
                        "Archived link {} not found",
                        archived_id
                    )));
                }

                let model = fields_to_link_active_model(fields).insert(&txn).await?;

                txn.commit().await?;
                Ok::<_, DbErr>(model)
            },
        )
        .await;

        match result {
            Ok(model) => {
                let link = model_to_link(model);
                info!(
                    "Archived link {} restored as {} ({})",
                    archived_id,
                    link.id,
                    link.fields.code()
                );
                Ok(link)
            }
            Err(e) if is_unique_violation(&e) => Err(LinkError::duplicate_code(format!(
                "Short code '{}' is already taken",
                fields.code()
            ))),
            Err(e) => Err(map_lifecycle_err(&operation_name, e)),
        }
    }

    /// 永久删除一条归档，返回是否存在
    pub async fn purge_archived(&self, id: i64) -> Result<bool> {
        let db = &self.db;

        let result = retry::with_retry(&format!("purge_archived({})", id), self.retry_config, || async {
            deleted_shortened_link::Entity::delete_by_id(id).exec(db).await
        })
        .await
        .map_err(|e| LinkError::database_operation(format!("永久删除归档失败: {}", e)))?;

        Ok(result.rows_affected > 0)
    }

    /// 永久删除一批归档
    pub async fn purge_archived_ids(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = deleted_shortened_link::Entity::delete_many()
            .filter(deleted_shortened_link::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("批量永久删除失败: {}", e)))?;

        Ok(result.rows_affected)
    }

    /// 永久删除用户选中的归档，忽略不属于该用户的 id
    pub async fn purge_archived_for_user(&self, user_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = deleted_shortened_link::Entity::delete_many()
            .filter(deleted_shortened_link::Column::UserId.eq(user_id))
            .filter(deleted_shortened_link::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("批量永久删除失败: {}", e)))?;

        info!(
            "User {}: purged {} archived links",
            user_id, result.rows_affected
        );
        Ok(result.rows_affected)
    }
}
