use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod models;

pub use backend::{ArchiveStamp, ArchivedMove, RetryConfig, SeaOrmStorage};
pub use models::{ArchivedLink, LinkCounts, LinkFields, Role, ShortenedLink, User};

pub struct StorageFactory;

impl StorageFactory {
    /// 根据全局配置创建存储
    pub async fn create() -> Result<Arc<SeaOrmStorage>> {
        let config = crate::config::get_config();
        Self::create_with(&config.database).await
    }

    pub async fn create_with(config: &DatabaseConfig) -> Result<Arc<SeaOrmStorage>> {
        // 从 URL 自动推断数据库类型
        let storage = SeaOrmStorage::from_config(config).await?;
        Ok(Arc::new(storage))
    }
}
