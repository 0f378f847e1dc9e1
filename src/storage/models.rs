use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// 账户角色，决定配额与归档保留期
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Premium,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
    pub max_num_links: u32,
    pub max_num_links_temporary: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current number of links a user owns, per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounts {
    pub permanent: u64,
    pub temporary: u64,
}

/// Field set shared by live and archived links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFields {
    pub original_link: String,
    pub shortened_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub remove_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub user_id: i64,
}

impl LinkFields {
    /// 有 remove_at 的链接是临时链接
    pub fn is_temporary(&self) -> bool {
        self.remove_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.remove_at.is_some_and(|remove_at| remove_at <= now)
    }

    /// active 且未过期
    pub fn is_functional_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    pub fn code(&self) -> &str {
        self.shortened_link.as_deref().unwrap_or_default()
    }

    /// remove_at 早于 `expired_before` 时替换为 `replacement`，返回是否发生替换
    pub fn refresh_expiry(
        &mut self,
        expired_before: DateTime<Utc>,
        replacement: DateTime<Utc>,
    ) -> bool {
        match self.remove_at {
            Some(remove_at) if remove_at <= expired_before => {
                self.remove_at = Some(replacement);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenedLink {
    pub id: i64,
    #[serde(flatten)]
    pub fields: LinkFields,
}

impl ShortenedLink {
    pub fn is_functional(&self) -> bool {
        self.fields.is_functional_at(Utc::now())
    }

    pub fn is_functional_at(&self, now: DateTime<Utc>) -> bool {
        self.fields.is_functional_at(now)
    }

    pub fn is_temporary(&self) -> bool {
        self.fields.is_temporary()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedLink {
    pub id: i64,
    #[serde(flatten)]
    pub fields: LinkFields,
    pub removed_at: DateTime<Utc>,
}

impl ArchivedLink {
    /// 永久删除的时间点
    pub fn purge_at(&self, retention: Duration) -> DateTime<Utc> {
        self.removed_at + retention
    }

    pub fn is_purge_eligible_at(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        now >= self.purge_at(retention)
    }
}
