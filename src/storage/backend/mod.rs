//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod archive;
mod connection;
mod converters;
mod links;
pub mod retry;
mod users;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, SqlErr};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{LinkError, Result};

pub use connection::{PoolSettings, connect, run_migrations};
pub use converters::{model_to_archived, model_to_link, model_to_user};
pub use links::{ArchiveStamp, ArchivedMove};
pub use retry::RetryConfig;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(LinkError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage for live links, the soft-delete archive and users
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    /// 重试配置
    retry_config: RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(
        database_url: &str,
        backend_name: &str,
        retry_config: RetryConfig,
    ) -> Result<Self> {
        Self::open(database_url, backend_name, retry_config, PoolSettings::default()).await
    }

    /// 根据 DatabaseConfig 连接（自动推断数据库类型）
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let backend_name = infer_backend_from_url(&config.database_url)?;
        Self::open(
            &config.database_url,
            &backend_name,
            RetryConfig::from(config),
            PoolSettings::from(config),
        )
        .await
    }

    async fn open(
        database_url: &str,
        backend_name: &str,
        retry_config: RetryConfig,
        settings: PoolSettings,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(LinkError::database_config(
                "DATABASE_URL 未设置".to_string(),
            ));
        }

        let db = connect(database_url, backend_name, settings).await?;
        run_migrations(&db).await?;

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry_config,
        };
        info!("{} storage initialized", storage.backend_name.to_uppercase());
        Ok(storage)
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// SQLite 不支持 SELECT ... FOR UPDATE（写事务本身已串行化）
    pub(crate) fn supports_row_locks(&self) -> bool {
        self.db.get_database_backend() != DbBackend::Sqlite
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn is_foreign_key_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
}

/// 将多步事务（归档 / 恢复）的错误映射为领域错误
pub(crate) fn map_lifecycle_err(operation: &str, err: DbErr) -> LinkError {
    match err {
        DbErr::RecordNotFound(msg) => LinkError::not_found(msg),
        e if retry::is_transient_or_integrity(&e) => {
            LinkError::integrity_conflict(format!("{} 重试后仍失败: {}", operation, e))
        }
        e => LinkError::database_operation(format!("{} 失败: {}", operation, e)),
    }
}
