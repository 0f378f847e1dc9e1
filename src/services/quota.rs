//! Per-role link quotas
//!
//! Permanent links (`remove_at` unset) and temporary links are capped
//! separately. The caps come from an explicit [`QuotaLimits`] value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{QuotaLimits, RoleLimits};
use crate::errors::{LinkError, Result};
use crate::storage::{LinkCounts, SeaOrmStorage, User};

/// 每个类别超出上限的数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaExcess {
    pub permanent: u64,
    pub temporary: u64,
}

impl QuotaExcess {
    pub fn total(&self) -> u64 {
        self.permanent + self.temporary
    }
}

/// 当前数量是否还允许在该类别下新建
pub fn allows(counts: LinkCounts, limits: RoleLimits, is_temporary: bool) -> bool {
    if is_temporary {
        counts.temporary < u64::from(limits.max_temporary_links)
    } else {
        counts.permanent < u64::from(limits.max_links)
    }
}

pub fn excess(counts: LinkCounts, limits: RoleLimits) -> QuotaExcess {
    QuotaExcess {
        permanent: counts
            .permanent
            .saturating_sub(u64::from(limits.max_links)),
        temporary: counts
            .temporary
            .saturating_sub(u64::from(limits.max_temporary_links)),
    }
}

#[derive(Clone)]
pub struct QuotaPolicy {
    storage: Arc<SeaOrmStorage>,
    limits: QuotaLimits,
}

impl QuotaPolicy {
    pub fn new(storage: Arc<SeaOrmStorage>, limits: QuotaLimits) -> Self {
        Self { storage, limits }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    pub fn limits_for(&self, user: &User) -> RoleLimits {
        self.limits.for_role(user.role)
    }

    pub async fn counts(&self, user: &User) -> Result<LinkCounts> {
        self.storage.count_links(user.id).await
    }

    pub async fn can_create(&self, user: &User, is_temporary: bool) -> Result<bool> {
        let counts = self.counts(user).await?;
        Ok(allows(counts, self.limits_for(user), is_temporary))
    }

    /// 与 `can_create` 相同，但超额时返回 QuotaExceeded
    pub async fn ensure_can_create(&self, user: &User, is_temporary: bool) -> Result<()> {
        if self.can_create(user, is_temporary).await? {
            return Ok(());
        }

        let limits = self.limits_for(user);
        let message = if is_temporary {
            format!(
                "User '{}' has reached the limit of {} temporary links",
                user.username, limits.max_temporary_links
            )
        } else {
            format!(
                "User '{}' has reached the limit of {} permanent links",
                user.username, limits.max_links
            )
        };
        Err(LinkError::quota_exceeded(message))
    }

    pub async fn excess(&self, user: &User) -> Result<QuotaExcess> {
        let counts = self.counts(user).await?;
        Ok(excess(counts, self.limits_for(user)))
    }
}
