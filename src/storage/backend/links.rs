//! Live link operations for SeaOrmStorage
//!
//! Reads and single-row writes on `shortened_links`, plus the
//! delete-into-archive transaction used by user deletes and the scheduler.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use tracing::{debug, info};

use super::converters::{
    fields_to_archived_active_model, fields_to_link_active_model, link_to_update_active_model,
    model_to_archived, model_to_link,
};
use super::{SeaOrmStorage, is_foreign_key_violation, is_unique_violation, map_lifecycle_err, retry};
use crate::config::EvictionOrder;
use crate::errors::{LinkError, Result};
use crate::storage::models::{ArchivedLink, LinkCounts, LinkFields, ShortenedLink};

use migration::entities::shortened_link;

/// 归档时间戳：removed_at 以及已过期链接的替换过期时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStamp {
    pub removed_at: DateTime<Utc>,
    pub replacement_expiry: DateTime<Utc>,
}

impl ArchiveStamp {
    pub fn new(now: DateTime<Utc>, default_expiry: chrono::Duration) -> Self {
        Self {
            removed_at: now,
            replacement_expiry: now + default_expiry,
        }
    }
}

/// 一条被移入归档的链接：删除前的行与归档后的行
#[derive(Debug, Clone)]
pub struct ArchivedMove {
    pub link: ShortenedLink,
    pub archived: ArchivedLink,
}

/// 在事务内把一行移入归档：复制（不含 id）后删除原行
async fn archive_in_txn(
    txn: &DatabaseTransaction,
    model: shortened_link::Model,
    stamp: ArchiveStamp,
) -> std::result::Result<ArchivedMove, DbErr> {
    let link = model_to_link(model);

    let mut fields = link.fields.clone();
    // 删除时已经过期的链接，归档副本改为 now + 默认有效期
    fields.refresh_expiry(stamp.removed_at, stamp.replacement_expiry);

    let archived = fields_to_archived_active_model(&fields, stamp.removed_at)
        .insert(txn)
        .await?;

    let deleted = shortened_link::Entity::delete_by_id(link.id)
        .exec(txn)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(DbErr::RecordNotFound(format!(
            "shortened link {} disappeared during archive",
            link.id
        )));
    }

    Ok(ArchivedMove {
        link,
        archived: model_to_archived(archived),
    })
}

impl SeaOrmStorage {
    /// 插入新链接；短码唯一冲突映射为 DuplicateCode
    pub async fn insert_link(&self, fields: &LinkFields) -> Result<ShortenedLink> {
        let db = &self.db;

        let result = retry::with_retry("insert_link", self.retry_config, || async {
            fields_to_link_active_model(fields).insert(db).await
        })
        .await;

        match result {
            Ok(model) => {
                let link = model_to_link(model);
                info!(
                    "Shortened link created: {} (id {}, user {})",
                    link.fields.code(),
                    link.id,
                    link.fields.user_id
                );
                Ok(link)
            }
            Err(e) if is_unique_violation(&e) => Err(LinkError::duplicate_code(format!(
                "Short code '{}' is already taken",
                fields.code()
            ))),
            Err(e) if is_foreign_key_violation(&e) => Err(LinkError::not_found(format!(
                "User {} not found",
                fields.user_id
            ))),
            Err(e) => Err(LinkError::database_operation(format!(
                "创建短链接失败: {}",
                e
            ))),
        }
    }

    pub async fn get_link(&self, id: i64) -> Result<Option<ShortenedLink>> {
        let db = &self.db;

        retry::with_retry(&format!("get_link({})", id), self.retry_config, || async {
            shortened_link::Entity::find_by_id(id).one(db).await
        })
        .await
        .map(|model| model.map(model_to_link))
        .map_err(|e| LinkError::database_operation(format!("查询短链接失败: {}", e)))
    }

    pub async fn get_link_for_user(&self, user_id: i64, id: i64) -> Result<Option<ShortenedLink>> {
        Ok(self
            .get_link(id)
            .await?
            .filter(|link| link.fields.user_id == user_id))
    }

    pub async fn get_link_by_code(&self, code: &str) -> Result<Option<ShortenedLink>> {
        let db = &self.db;

        retry::with_retry(
            &format!("get_link_by_code({})", code),
            self.retry_config,
            || async {
                shortened_link::Entity::find()
                    .filter(shortened_link::Column::ShortenedLink.eq(code))
                    .one(db)
                    .await
            },
        )
        .await
        .map(|model| model.map(model_to_link))
        .map_err(|e| LinkError::database_operation(format!("按短码查询失败: {}", e)))
    }

    /// 用户的全部链接，最新创建的在前
    pub async fn list_links(&self, user_id: i64) -> Result<Vec<ShortenedLink>> {
        let models = shortened_link::Entity::find()
            .filter(shortened_link::Column::UserId.eq(user_id))
            .order_by_desc(shortened_link::Column::CreatedAt)
            .order_by_desc(shortened_link::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("加载链接列表失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_link).collect())
    }

    /// 按类别统计用户当前的链接数量
    pub async fn count_links(&self, user_id: i64) -> Result<LinkCounts> {
        let permanent = shortened_link::Entity::find()
            .filter(shortened_link::Column::UserId.eq(user_id))
            .filter(shortened_link::Column::RemoveAt.is_null())
            .count(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("统计永久链接失败: {}", e)))?;

        let temporary = shortened_link::Entity::find()
            .filter(shortened_link::Column::UserId.eq(user_id))
            .filter(shortened_link::Column::RemoveAt.is_not_null())
            .count(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("统计临时链接失败: {}", e)))?;

        Ok(LinkCounts {
            permanent,
            temporary,
        })
    }

    /// 保存对已有链接的修改
    pub async fn save_link(&self, link: &ShortenedLink) -> Result<ShortenedLink> {
        let db = &self.db;

        let result = retry::with_retry(
            &format!("save_link({})", link.id),
            self.retry_config,
            || async { link_to_update_active_model(link).update(db).await },
        )
        .await;

        match result {
            Ok(model) => {
                debug!("Shortened link {} updated", link.id);
                Ok(model_to_link(model))
            }
            Err(DbErr::RecordNotUpdated) => Err(LinkError::not_found(format!(
                "Link {} not found",
                link.id
            ))),
            Err(e) if is_unique_violation(&e) => Err(LinkError::duplicate_code(format!(
                "Short code '{}' is already taken",
                link.fields.code()
            ))),
            Err(e) => Err(LinkError::database_operation(format!(
                "更新短链接失败: {}",
                e
            ))),
        }
    }

    /// 批量切换 is_active，只影响属于该用户的 id
    pub async fn set_links_active(
        &self,
        user_id: i64,
        ids: &[i64],
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = shortened_link::Entity::update_many()
            .col_expr(shortened_link::Column::IsActive, Expr::value(active))
            .col_expr(shortened_link::Column::UpdatedAt, Expr::value(now))
            .filter(shortened_link::Column::UserId.eq(user_id))
            .filter(shortened_link::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("批量更新状态失败: {}", e)))?;

        info!(
            "User {}: set is_active={} on {} links",
            user_id, active, result.rows_affected
        );
        Ok(result.rows_affected)
    }

    /// 超额淘汰候选：按配置的顺序取前 `limit` 条
    pub async fn find_eviction_candidates(
        &self,
        user_id: i64,
        temporary: bool,
        order: EvictionOrder,
        limit: u64,
    ) -> Result<Vec<ShortenedLink>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let category = if temporary {
            shortened_link::Column::RemoveAt.is_not_null()
        } else {
            shortened_link::Column::RemoveAt.is_null()
        };

        let order_column = match order {
            EvictionOrder::LeastRecentlyUpdated => shortened_link::Column::UpdatedAt,
            EvictionOrder::OldestCreated => shortened_link::Column::CreatedAt,
        };

        let models = shortened_link::Entity::find()
            .filter(shortened_link::Column::UserId.eq(user_id))
            .filter(category)
            .order_by_asc(order_column)
            .order_by_asc(shortened_link::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("查询淘汰候选失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_link).collect())
    }

    /// 在单个事务内把所有满足条件的链接移入归档
    ///
    /// 候选行在事务内重新读取（支持的数据库上加 FOR UPDATE），
    /// 并发修改使其不再满足条件的行会被跳过。
    pub async fn archive_matching(
        &self,
        operation_name: &str,
        condition: Condition,
        stamp: ArchiveStamp,
        attempts: u32,
    ) -> Result<Vec<ArchivedMove>> {
        let db = &self.db;
        let lock = self.supports_row_locks();
        let config = self.retry_config.with_attempts(attempts);

        let moved = retry::with_retry_if(
            operation_name,
            config,
            retry::is_transient_or_integrity,
            || {
                let condition = condition.clone();
                async move {
                    let txn = db.begin().await?;

                    let mut query = shortened_link::Entity::find()
                        .filter(condition)
                        .order_by_asc(shortened_link::Column::Id);
                    if lock {
                        query = query.lock_exclusive();
                    }
                    let models = query.all(&txn).await?;

                    let mut moved = Vec::with_capacity(models.len());
                    for model in models {
                        moved.push(archive_in_txn(&txn, model, stamp).await?);
                    }

                    txn.commit().await?;
                    Ok::<_, DbErr>(moved)
                }
            },
        )
        .await
        .map_err(|e| map_lifecycle_err(operation_name, e))?;

        if !moved.is_empty() {
            info!("{}: archived {} links", operation_name, moved.len());
        }
        Ok(moved)
    }

    /// 删除单条链接（移入归档）；`owner` 为 Some 时只允许删除该用户的链接
    pub async fn archive_link(
        &self,
        id: i64,
        owner: Option<i64>,
        stamp: ArchiveStamp,
        attempts: u32,
    ) -> Result<ArchivedMove> {
        let mut condition = Condition::all().add(shortened_link::Column::Id.eq(id));
        if let Some(user_id) = owner {
            condition = condition.add(shortened_link::Column::UserId.eq(user_id));
        }

        self.archive_matching(&format!("archive_link({})", id), condition, stamp, attempts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LinkError::not_found(format!("Link {} not found", id)))
    }

    /// 批量删除用户选中的链接（移入归档）
    pub async fn archive_links_for_user(
        &self,
        user_id: i64,
        ids: &[i64],
        stamp: ArchiveStamp,
        attempts: u32,
    ) -> Result<Vec<ArchivedMove>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let condition = Condition::all()
            .add(shortened_link::Column::UserId.eq(user_id))
            .add(shortened_link::Column::Id.is_in(ids.iter().copied()));

        self.archive_matching("archive_links_for_user", condition, stamp, attempts)
            .await
    }

    /// 把 remove_at <= now 的链接全部移入归档
    pub async fn archive_expired(
        &self,
        now: DateTime<Utc>,
        stamp: ArchiveStamp,
        attempts: u32,
    ) -> Result<Vec<ArchivedMove>> {
        let condition = Condition::all()
            .add(shortened_link::Column::RemoveAt.is_not_null())
            .add(shortened_link::Column::RemoveAt.lte(now));

        self.archive_matching("archive_expired", condition, stamp, attempts)
            .await
    }

    /// 淘汰指定的超额链接；类别在事务内复核，期间被切换类别的行会被跳过
    pub async fn archive_evicted(
        &self,
        user_id: i64,
        ids: &[i64],
        temporary: bool,
        stamp: ArchiveStamp,
        attempts: u32,
    ) -> Result<Vec<ArchivedMove>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let category = if temporary {
            shortened_link::Column::RemoveAt.is_not_null()
        } else {
            shortened_link::Column::RemoveAt.is_null()
        };

        let condition = Condition::all()
            .add(shortened_link::Column::UserId.eq(user_id))
            .add(shortened_link::Column::Id.is_in(ids.iter().copied()))
            .add(category);

        self.archive_matching("archive_evicted", condition, stamp, attempts)
            .await
    }
}
