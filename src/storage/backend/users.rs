use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::info;

use super::converters::{model_to_user, user_to_active_model};
use super::{SeaOrmStorage, is_unique_violation, retry};
use crate::errors::{LinkError, Result};
use crate::storage::models::User;

use migration::entities::user;

impl SeaOrmStorage {
    pub async fn insert_user(&self, new_user: &User) -> Result<User> {
        let model = user_to_active_model(new_user, true)
            .insert(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LinkError::invalid_format(format!(
                        "Username '{}' is already taken",
                        new_user.username
                    ))
                } else {
                    LinkError::database_operation(format!("创建用户失败: {}", e))
                }
            })?;

        info!("User created: {} (id {})", model.username, model.id);
        Ok(model_to_user(model))
    }

    pub async fn save_user(&self, existing: &User) -> Result<User> {
        let model = user_to_active_model(existing, false)
            .update(&self.db)
            .await
            .map_err(|e| match e {
                DbErr::RecordNotUpdated => {
                    LinkError::not_found(format!("User {} not found", existing.id))
                }
                e => LinkError::database_operation(format!("更新用户失败: {}", e)),
            })?;

        Ok(model_to_user(model))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let db = &self.db;

        retry::with_retry(&format!("get_user({})", id), self.retry_config, || async {
            user::Entity::find_by_id(id).one(db).await
        })
        .await
        .map(|model| model.map(model_to_user))
        .map_err(|e| LinkError::database_operation(format!("查询用户失败: {}", e)))
    }

    /// 按 id 批量加载用户；不存在的 id 直接跳过
    pub async fn get_users(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("批量查询用户失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_user).collect())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| LinkError::database_operation(format!("加载用户列表失败: {}", e)))?;

        Ok(models.into_iter().map(model_to_user).collect())
    }
}
