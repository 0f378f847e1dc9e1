//! Database connection setup
//!
//! SQLite gets a tuned single-file pool (WAL, configurable busy timeout);
//! MySQL and PostgreSQL go through SeaORM's generic pool.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::errors::{LinkError, Result};
use migration::{Migrator, MigratorTrait};

/// 连接池参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub pool_size: u32,
    /// SQLite 写锁等待时间；超时后返回 BUSY，由重试层处理
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            pool_size: config.pool_size.max(1),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// 按后端类型建立连接
pub async fn connect(
    database_url: &str,
    backend_name: &str,
    settings: PoolSettings,
) -> Result<DatabaseConnection> {
    debug!(
        "Connecting to {} (pool {}, busy timeout {:?})",
        backend_name, settings.pool_size, settings.busy_timeout
    );
    match backend_name {
        "sqlite" => connect_sqlite(database_url, settings).await,
        "mysql" | "postgres" => connect_generic(database_url, backend_name, settings).await,
        other => Err(LinkError::database_config(format!(
            "不支持的数据库类型: {}",
            other
        ))),
    }
}

async fn connect_sqlite(database_url: &str, settings: PoolSettings) -> Result<DatabaseConnection> {
    use sea_orm::SqlxSqliteConnector;
    use sea_orm::sqlx::sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
    };
    use std::str::FromStr;

    // 外键约束保证链接始终属于存在的用户
    let opt = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| LinkError::database_config(format!("SQLite URL 解析失败: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(settings.busy_timeout)
        .pragma("temp_store", "memory");

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.pool_size)
        .connect_with(opt)
        .await
        .map_err(|e| {
            LinkError::database_connection(format!("无法连接到 SQLite 数据库: {}", e))
        })?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn connect_generic(
    database_url: &str,
    backend_name: &str,
    settings: PoolSettings,
) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(settings.pool_size)
        .min_connections(settings.pool_size.min(2))
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        LinkError::database_connection(format!(
            "无法连接到 {} 数据库: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

/// 建表 / 升级到最新的 schema
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| LinkError::database_operation(format!("迁移失败: {}", e)))?;

    info!("Database schema is up to date");
    Ok(())
}
