//! Lifecycle reconciliation jobs
//!
//! Each job is a plain async call that returns its counters or an error;
//! retries belong to [`super::JobRunner`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::report::{JobCounters, JobKind};
use crate::config::LifecyclePolicy;
use crate::errors::Result;
use crate::services::notifier::{
    NotificationKind, NotificationPayload, Notifier, deliver_notification,
};
use crate::services::quota::QuotaPolicy;
use crate::storage::{ArchiveStamp, ArchivedLink, ArchivedMove, Role, SeaOrmStorage, User};

/// 单个用户每次运行最多淘汰的轮数
const MAX_EVICTION_PASSES: u32 = 3;

pub struct LifecycleJobs {
    storage: Arc<SeaOrmStorage>,
    quota: QuotaPolicy,
    policy: Arc<LifecyclePolicy>,
    notifier: Arc<dyn Notifier>,
    /// 尚未完成的通知任务，退出前由 flush_notifications 等待
    pending: Mutex<JoinSet<()>>,
}

impl LifecycleJobs {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        policy: Arc<LifecyclePolicy>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let quota = QuotaPolicy::new(storage.clone(), policy.quota);
        Self {
            storage,
            quota,
            policy,
            notifier,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub async fn run(&self, kind: JobKind) -> Result<JobCounters> {
        self.run_at(kind, Utc::now()).await
    }

    pub async fn run_at(&self, kind: JobKind, now: DateTime<Utc>) -> Result<JobCounters> {
        match kind {
            JobKind::ExpireLinks => self.expire_links_at(now).await,
            JobKind::EnforceQuota => self.enforce_quota_at(now).await,
            JobKind::PurgeArchive => self.purge_archive_at(now).await,
        }
    }

    /// 在后台发送通知，并顺带回收已完成的任务
    fn dispatch(&self, user: User, kind: NotificationKind, payload: NotificationPayload) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}
        pending.spawn(deliver_notification(
            self.notifier.clone(),
            user,
            kind,
            payload,
        ));
    }

    /// 等待所有已派发的通知完成，最多等待 `limit`
    ///
    /// 返回超时后仍未送达的通知数量（这些任务会被取消）。
    pub async fn flush_notifications(&self, limit: Duration) -> usize {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, JoinSet::new())
        };
        if pending.is_empty() {
            return 0;
        }

        let drained = tokio::time::timeout(limit, async {
            while pending.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => 0,
            Err(_) => {
                let remaining = pending.len();
                warn!(
                    "{} notifications still pending after {:?}, dropping them",
                    remaining, limit
                );
                remaining
            }
        }
    }

    /// 查找用户并异步发送通知；查不到用户只记录日志
    async fn notify(&self, user_id: i64, kind: NotificationKind, payload: NotificationPayload) -> bool {
        match self.storage.get_user(user_id).await {
            Ok(Some(user)) => {
                self.dispatch(user, kind, payload);
                true
            }
            Ok(None) => {
                warn!("{} notification skipped: user {} not found", kind, user_id);
                false
            }
            Err(e) => {
                warn!("{} notification skipped for user {}: {}", kind, user_id, e);
                false
            }
        }
    }

    /// 把已过期的临时链接移入归档，每个用户收到一条汇总通知
    pub async fn expire_links_at(&self, now: DateTime<Utc>) -> Result<JobCounters> {
        let stamp = ArchiveStamp::new(now, self.policy.default_expiry());
        let moved = self
            .storage
            .archive_expired(now, stamp, self.policy.archive_copy_attempts)
            .await?;

        let mut by_owner: BTreeMap<i64, Vec<ArchivedMove>> = BTreeMap::new();
        for item in moved {
            by_owner
                .entry(item.link.fields.user_id)
                .or_default()
                .push(item);
        }

        let mut counters = JobCounters::default();
        for (user_id, batch) in by_owner {
            counters.deleted_count += batch.len() as u64;
            let payload = NotificationPayload::from_links(batch.iter().map(|m| &m.link));
            if self
                .notify(user_id, NotificationKind::LinksExpired, payload)
                .await
            {
                counters.affected_users += 1;
            }
        }

        info!(
            "Expire job: archived {} links for {} users",
            counters.deleted_count, counters.affected_users
        );
        Ok(counters)
    }

    /// 删除每个用户超出上限的链接（按配置的淘汰顺序）
    pub async fn enforce_quota_at(&self, now: DateTime<Utc>) -> Result<JobCounters> {
        let stamp = ArchiveStamp::new(now, self.policy.default_expiry());
        let mut counters = JobCounters::default();

        for user in self.storage.list_users().await? {
            let evicted = self.evict_excess(&user, stamp).await?;
            if evicted.is_empty() {
                continue;
            }

            counters.deleted_count += evicted.len() as u64;
            counters.affected_users += 1;
            self.dispatch(
                user,
                NotificationKind::LinksEvicted,
                NotificationPayload::from_links(evicted.iter().map(|m| &m.link)),
            );
        }

        info!(
            "Quota job: evicted {} links from {} users",
            counters.deleted_count, counters.affected_users
        );
        Ok(counters)
    }

    /// 淘汰单个用户的超额链接，每轮之后重新计算超额
    ///
    /// 淘汰期间链接可能被并发修改（例如永久链接被设置了过期时间），
    /// 所以一轮之后仍可能超额。
    async fn evict_excess(&self, user: &User, stamp: ArchiveStamp) -> Result<Vec<ArchivedMove>> {
        let mut evicted: Vec<ArchivedMove> = Vec::new();

        for pass in 1..=MAX_EVICTION_PASSES {
            let excess = self.quota.excess(user).await?;
            if excess.total() == 0 {
                return Ok(evicted);
            }
            debug!(
                "User {} over quota by {}/{} (pass {})",
                user.id, excess.permanent, excess.temporary, pass
            );

            let before = evicted.len();
            for (temporary, count) in [(false, excess.permanent), (true, excess.temporary)] {
                if count == 0 {
                    continue;
                }
                let candidates = self
                    .storage
                    .find_eviction_candidates(user.id, temporary, self.policy.eviction_order, count)
                    .await?;
                let ids: Vec<i64> = candidates.iter().map(|link| link.id).collect();
                evicted.extend(
                    self.storage
                        .archive_evicted(user.id, &ids, temporary, stamp, self.policy.archive_copy_attempts)
                        .await?,
                );
            }

            if evicted.len() == before {
                break;
            }
        }

        let excess = self.quota.excess(user).await?;
        if excess.total() > 0 {
            warn!(
                "User {} still over quota by {}/{} after eviction",
                user.id, excess.permanent, excess.temporary
            );
        }
        Ok(evicted)
    }

    /// 永久删除超过保留期的归档（保留期按所有者角色计算）
    pub async fn purge_archive_at(&self, now: DateTime<Utc>) -> Result<JobCounters> {
        // 先用最短保留期在 SQL 中缩小范围，再按角色逐条判断
        let cutoff = now - self.policy.min_retention();
        let candidates = self.storage.list_archived_removed_before(cutoff).await?;
        if candidates.is_empty() {
            return Ok(JobCounters::default());
        }

        let owner_ids: Vec<i64> = candidates
            .iter()
            .map(|record| record.fields.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut owners: HashMap<i64, User> = self
            .storage
            .get_users(&owner_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut by_owner: BTreeMap<i64, Vec<ArchivedLink>> = BTreeMap::new();
        for record in candidates {
            let role = owners
                .get(&record.fields.user_id)
                .map(|user| user.role)
                .unwrap_or(Role::User);
            if record.is_purge_eligible_at(self.policy.retention(role), now) {
                by_owner
                    .entry(record.fields.user_id)
                    .or_default()
                    .push(record);
            }
        }

        let ids: Vec<i64> = by_owner.values().flatten().map(|record| record.id).collect();
        if ids.is_empty() {
            return Ok(JobCounters::default());
        }
        let deleted = self.storage.purge_archived_ids(&ids).await?;

        let mut counters = JobCounters {
            deleted_count: deleted,
            affected_users: 0,
        };
        for (user_id, batch) in by_owner {
            if let Some(user) = owners.remove(&user_id) {
                counters.affected_users += 1;
                self.dispatch(
                    user,
                    NotificationKind::LinkPurged,
                    NotificationPayload::from_links(&batch),
                );
            }
        }

        info!(
            "Purge job: permanently deleted {} archived links",
            counters.deleted_count
        );
        Ok(counters)
    }
}
