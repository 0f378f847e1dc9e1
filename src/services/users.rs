//! Account records the lifecycle engine reads
//!
//! Link caps are derived from the role on every save; a superuser is
//! always stored as admin.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::QuotaLimits;
use crate::errors::{LinkError, Result};
use crate::storage::{LinkCounts, Role, SeaOrmStorage, User};

/// 按角色重新计算上限（超级用户强制为 admin）
pub fn apply_role_caps(user: &mut User, limits: &QuotaLimits) {
    if user.is_superuser {
        user.role = Role::Admin;
    }
    let caps = limits.for_role(user.role);
    user.max_num_links = caps.max_links;
    user.max_num_links_temporary = caps.max_temporary_links;
}

pub struct UserService {
    storage: Arc<SeaOrmStorage>,
    limits: QuotaLimits,
}

impl UserService {
    pub fn new(storage: Arc<SeaOrmStorage>, limits: QuotaLimits) -> Self {
        Self { storage, limits }
    }

    pub async fn create_user(&self, username: &str, role: Role, is_superuser: bool) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(LinkError::invalid_format("Username cannot be empty"));
        }

        let now = Utc::now();
        let mut user = User {
            id: 0,
            username: username.to_string(),
            role,
            is_superuser,
            max_num_links: 0,
            max_num_links_temporary: 0,
            created_at: now,
            updated_at: now,
        };
        apply_role_caps(&mut user, &self.limits);

        self.storage.insert_user(&user).await
    }

    async fn save(&self, mut user: User) -> Result<User> {
        apply_role_caps(&mut user, &self.limits);
        user.updated_at = Utc::now();
        self.storage.save_user(&user).await
    }

    pub async fn set_role(&self, user_id: i64, role: Role) -> Result<User> {
        let mut user = self.get_user(user_id).await?;
        let previous = user.role;
        user.role = role;

        let saved = self.save(user).await?;
        info!(
            "User {} role changed: {} -> {} (caps {}/{})",
            saved.id, previous, saved.role, saved.max_num_links, saved.max_num_links_temporary
        );
        Ok(saved)
    }

    pub async fn set_superuser(&self, user_id: i64, is_superuser: bool) -> Result<User> {
        let mut user = self.get_user(user_id).await?;
        user.is_superuser = is_superuser;
        self.save(user).await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| LinkError::not_found(format!("User {} not found", user_id)))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.storage.list_users().await
    }

    /// 当前永久 / 临时链接数量
    pub async fn link_num(&self, user: &User) -> Result<LinkCounts> {
        self.storage.count_links(user.id).await
    }
}
