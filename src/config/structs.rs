use chrono::Duration;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

use crate::storage::models::Role;

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - database: 数据库连接与重试
/// - logging: 日志配置
/// - lifecycle: 配额、保留期、过期等生命周期策略
/// - scheduler: 定时任务间隔与重试策略
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub lifecycle: LifecyclePolicy,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：LC，分隔符：__
    /// 示例：LC__DATABASE__DATABASE_URL=sqlite://links.db
    pub fn load() -> Self {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 LC，分隔符 __
            .add_source(
                Environment::with_prefix("LC")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(mut config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    for field in config.lifecycle.sanitize() {
                        eprintln!(
                            "[WARN] lifecycle.{} is out of range, using the default",
                            field
                        );
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// SQLite 等待写锁的时间
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 单个角色的链接上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLimits {
    pub max_links: u32,
    pub max_temporary_links: u32,
}

/// 按角色划分的配额（保存用户时写入 users 表）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default = "default_user_limits")]
    pub user: RoleLimits,
    #[serde(default = "default_premium_limits")]
    pub premium: RoleLimits,
    #[serde(default = "default_admin_limits")]
    pub admin: RoleLimits,
}

impl QuotaLimits {
    pub fn for_role(&self, role: Role) -> RoleLimits {
        match role {
            Role::User => self.user,
            Role::Premium => self.premium,
            Role::Admin => self.admin,
        }
    }
}

/// 归档保留天数（从 removed_at 开始计算）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_user_retention_days")]
    pub user_days: u32,
    #[serde(default = "default_privileged_retention_days")]
    pub premium_days: u32,
    #[serde(default = "default_privileged_retention_days")]
    pub admin_days: u32,
}

impl RetentionPolicy {
    pub fn days_for(&self, role: Role) -> u32 {
        match role {
            Role::User => self.user_days,
            Role::Premium => self.premium_days,
            Role::Admin => self.admin_days,
        }
    }
}

/// 超额淘汰顺序
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvictionOrder {
    /// updated_at 升序：最久未修改的先被删除
    #[default]
    LeastRecentlyUpdated,
    /// created_at 升序：最早创建的先被删除
    OldestCreated,
}

/// Lifecycle policy shared by the link, archive, quota and scheduler components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    #[serde(default = "default_quota_limits")]
    pub quota: QuotaLimits,
    #[serde(default = "default_retention_policy")]
    pub retention: RetentionPolicy,
    /// Replacement lifetime for links that are already expired when archived or restored
    #[serde(default = "default_expiry_secs")]
    pub default_expiry_secs: u64,
    /// Minimum distance into the future for a caller-supplied `remove_at`
    #[serde(default = "default_min_expiry_lead_secs")]
    pub min_expiry_lead_secs: u64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_code_generation_attempts")]
    pub code_generation_attempts: u32,
    #[serde(default = "default_archive_copy_attempts")]
    pub archive_copy_attempts: u32,
    #[serde(default)]
    pub eviction_order: EvictionOrder,
}

/// 时长类策略的上限（100 年），超出会让时间运算溢出
pub const MAX_POLICY_SECS: u64 = 100 * 365 * 24 * 60 * 60;
pub const MAX_RETENTION_DAYS: u32 = 100 * 365;

/// 超出上限时使用 `fallback`
fn policy_seconds(secs: u64, fallback: u64) -> Duration {
    let secs = if secs > MAX_POLICY_SECS { fallback } else { secs };
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::zero)
}

impl LifecyclePolicy {
    pub fn default_expiry(&self) -> Duration {
        policy_seconds(self.default_expiry_secs, default_expiry_secs())
    }

    pub fn min_expiry_lead(&self) -> Duration {
        policy_seconds(self.min_expiry_lead_secs, default_min_expiry_lead_secs())
    }

    pub fn retention(&self, role: Role) -> Duration {
        Duration::days(i64::from(self.retention.days_for(role).min(MAX_RETENTION_DAYS)))
    }

    /// 所有角色中最短的保留期
    pub fn min_retention(&self) -> Duration {
        Role::iter()
            .map(|role| self.retention(role))
            .min()
            .unwrap_or_else(Duration::zero)
    }

    /// 把超出范围的值重置为默认值，返回被重置的字段名
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let defaults = RetentionPolicy::default();
        let mut reset = Vec::new();

        if self.default_expiry_secs > MAX_POLICY_SECS {
            self.default_expiry_secs = default_expiry_secs();
            reset.push("default_expiry_secs");
        }
        if self.min_expiry_lead_secs > MAX_POLICY_SECS {
            self.min_expiry_lead_secs = default_min_expiry_lead_secs();
            reset.push("min_expiry_lead_secs");
        }
        for (days, default_days, name) in [
            (&mut self.retention.user_days, defaults.user_days, "retention.user_days"),
            (&mut self.retention.premium_days, defaults.premium_days, "retention.premium_days"),
            (&mut self.retention.admin_days, defaults.admin_days, "retention.admin_days"),
        ] {
            if *days > MAX_RETENTION_DAYS {
                *days = default_days;
                reset.push(name);
            }
        }
        reset
    }
}

/// 定时任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_expire_interval_secs")]
    pub expire_links_interval_secs: u64,
    #[serde(default = "default_daily_interval_secs")]
    pub enforce_quota_interval_secs: u64,
    #[serde(default = "default_daily_interval_secs")]
    pub purge_archive_interval_secs: u64,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_job_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_job_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_job_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

// ============================================================
// Default value functions
// ============================================================

fn default_database_url() -> String {
    "sqlite://linkcycle.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_user_limits() -> RoleLimits {
    RoleLimits {
        max_links: 5,
        max_temporary_links: 2,
    }
}

fn default_premium_limits() -> RoleLimits {
    RoleLimits {
        max_links: 10,
        max_temporary_links: 5,
    }
}

fn default_admin_limits() -> RoleLimits {
    RoleLimits {
        max_links: 100,
        max_temporary_links: 100,
    }
}

fn default_quota_limits() -> QuotaLimits {
    QuotaLimits::default()
}

fn default_user_retention_days() -> u32 {
    3
}

fn default_privileged_retention_days() -> u32 {
    6
}

fn default_retention_policy() -> RetentionPolicy {
    RetentionPolicy::default()
}

fn default_expiry_secs() -> u64 {
    24 * 60 * 60
}

fn default_min_expiry_lead_secs() -> u64 {
    60
}

fn default_code_length() -> usize {
    10
}

fn default_code_generation_attempts() -> u32 {
    3
}

fn default_archive_copy_attempts() -> u32 {
    3
}

fn default_expire_interval_secs() -> u64 {
    5 * 60
}

fn default_daily_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_initial_delay_secs() -> u64 {
    30
}

fn default_job_max_retries() -> u32 {
    3
}

fn default_job_retry_base_delay_ms() -> u64 {
    1000
}

fn default_job_retry_max_delay_ms() -> u64 {
    60_000
}

// ============================================================
// Default implementations
// ============================================================

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            user: default_user_limits(),
            premium: default_premium_limits(),
            admin: default_admin_limits(),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            user_days: default_user_retention_days(),
            premium_days: default_privileged_retention_days(),
            admin_days: default_privileged_retention_days(),
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            quota: QuotaLimits::default(),
            retention: RetentionPolicy::default(),
            default_expiry_secs: default_expiry_secs(),
            min_expiry_lead_secs: default_min_expiry_lead_secs(),
            code_length: default_code_length(),
            code_generation_attempts: default_code_generation_attempts(),
            archive_copy_attempts: default_archive_copy_attempts(),
            eviction_order: EvictionOrder::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            expire_links_interval_secs: default_expire_interval_secs(),
            enforce_quota_interval_secs: default_daily_interval_secs(),
            purge_archive_interval_secs: default_daily_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            max_retries: default_job_max_retries(),
            retry_base_delay_ms: default_job_retry_base_delay_ms(),
            retry_max_delay_ms: default_job_retry_max_delay_ms(),
        }
    }
}
