//! Lifecycle job tests
//!
//! Expire, enforce-quota and purge-archive against a temporary SQLite file.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use linkcycle::config::{EvictionOrder, LifecyclePolicy, QuotaLimits};
use linkcycle::scheduler::{JobKind, JobRunner, JobStatus, LifecycleJobs, RunnerConfig};
use linkcycle::services::{
    NotificationKind, NotificationPayload, Notifier, QuotaPolicy, UserService,
};
use linkcycle::storage::backend::SeaOrmStorage;
use linkcycle::storage::{LinkFields, RetryConfig, Role, User};
use tempfile::TempDir;
use tokio::sync::mpsc;

// =============================================================================
// Test Setup
// =============================================================================

type Received = (i64, NotificationKind, NotificationPayload);

struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Received>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user: &User,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> linkcycle::errors::Result<()> {
        let _ = self.tx.send((user.id, kind, payload.clone()));
        Ok(())
    }
}

/// 先等待一段时间再记录，模拟较慢的通知通道
struct SlowNotifier {
    delay: StdDuration,
    tx: mpsc::UnboundedSender<Received>,
}

#[async_trait]
impl Notifier for SlowNotifier {
    async fn notify(
        &self,
        user: &User,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> linkcycle::errors::Result<()> {
        tokio::time::sleep(self.delay).await;
        let _ = self.tx.send((user.id, kind, payload.clone()));
        Ok(())
    }
}

struct TestContext {
    storage: Arc<SeaOrmStorage>,
    jobs: LifecycleJobs,
    notifications: mpsc::UnboundedReceiver<Received>,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn next_notification(&mut self) -> Received {
        tokio::time::timeout(StdDuration::from_secs(2), self.notifications.recv())
            .await
            .expect("notification not delivered")
            .expect("channel closed")
    }

    /// 等待 `n` 条通知，并确认之后没有多余的
    async fn collect_notifications(&mut self, n: usize) -> Vec<Received> {
        let mut received = Vec::with_capacity(n);
        for _ in 0..n {
            received.push(self.next_notification().await);
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(self.notifications.try_recv().is_err(), "unexpected extra notification");
        received
    }
}

async fn create_test_context(policy: LifecyclePolicy) -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("scheduler.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = Arc::new(
        SeaOrmStorage::new(&db_url, "sqlite", RetryConfig::default())
            .await
            .expect("Failed to create storage"),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let jobs = LifecycleJobs::new(
        storage.clone(),
        Arc::new(policy),
        Arc::new(RecordingNotifier { tx }),
    );

    TestContext {
        storage,
        jobs,
        notifications: rx,
        _temp_dir: temp_dir,
    }
}

async fn create_slow_context(delay: StdDuration) -> TestContext {
    let mut ctx = create_test_context(LifecyclePolicy::default()).await;
    let (tx, rx) = mpsc::unbounded_channel();
    ctx.jobs = LifecycleJobs::new(
        ctx.storage.clone(),
        Arc::new(LifecyclePolicy::default()),
        Arc::new(SlowNotifier { delay, tx }),
    );
    ctx.notifications = rx;
    ctx
}

async fn create_user(storage: &Arc<SeaOrmStorage>, username: &str, role: Role) -> User {
    UserService::new(storage.clone(), QuotaLimits::default())
        .create_user(username, role, false)
        .await
        .expect("Failed to create user")
}

/// 整秒时间，避免数据库精度影响边界比较
fn now_secs() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).expect("valid timestamp")
}

fn fields(
    user: &User,
    code: &str,
    remove_at: Option<DateTime<Utc>>,
    touched: DateTime<Utc>,
) -> LinkFields {
    LinkFields {
        original_link: format!("https://example.com/{}", code),
        shortened_link: Some(code.to_string()),
        created_at: touched,
        updated_at: touched,
        remove_at,
        is_active: true,
        user_id: user.id,
    }
}

// =============================================================================
// Expire Job Tests
// =============================================================================

#[cfg(test)]
mod expire_tests {
    use super::*;

    #[tokio::test]
    async fn test_expire_groups_notifications_by_owner() {
        let mut ctx = create_test_context(LifecyclePolicy::default()).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let b = create_user(&ctx.storage, "user_b", Role::User).await;
        let now = now_secs();
        let past = now - Duration::hours(1);

        ctx.storage.insert_link(&fields(&a, "a-exp-1", Some(past), past)).await.unwrap();
        ctx.storage.insert_link(&fields(&a, "a-exp-2", Some(now), past)).await.unwrap();
        ctx.storage.insert_link(&fields(&b, "b-exp-1", Some(past), past)).await.unwrap();
        // 未过期与永久链接不受影响
        ctx.storage
            .insert_link(&fields(&a, "a-live", Some(now + Duration::hours(1)), past))
            .await
            .unwrap();
        ctx.storage.insert_link(&fields(&b, "b-perm", None, past)).await.unwrap();

        let counters = ctx.jobs.expire_links_at(now).await.unwrap();
        assert_eq!(counters.deleted_count, 3);
        assert_eq!(counters.affected_users, 2);

        let by_user: BTreeMap<i64, (NotificationKind, usize)> = ctx
            .collect_notifications(2)
            .await
            .into_iter()
            .map(|(user_id, kind, payload)| (user_id, (kind, payload.count)))
            .collect();
        assert_eq!(by_user[&a.id], (NotificationKind::LinksExpired, 2));
        assert_eq!(by_user[&b.id], (NotificationKind::LinksExpired, 1));

        assert_eq!(ctx.storage.list_archived(a.id).await.unwrap().len(), 2);
        assert_eq!(ctx.storage.list_archived(b.id).await.unwrap().len(), 1);
        assert_eq!(ctx.storage.list_links(a.id).await.unwrap().len(), 1);
        assert_eq!(ctx.storage.list_links(b.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_archive_copy_gets_fresh_expiry() {
        let ctx = create_test_context(LifecyclePolicy::default()).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let now = now_secs();

        ctx.storage
            .insert_link(&fields(&a, "stale", Some(now - Duration::minutes(5)), now))
            .await
            .unwrap();
        ctx.jobs.expire_links_at(now).await.unwrap();

        let archived = ctx.storage.list_archived(a.id).await.unwrap();
        assert_eq!(archived[0].fields.remove_at, Some(now + Duration::days(1)));
        assert_eq!(archived[0].removed_at, now);
    }

    #[tokio::test]
    async fn test_expire_with_nothing_due() {
        let mut ctx = create_test_context(LifecyclePolicy::default()).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let now = now_secs();
        ctx.storage
            .insert_link(&fields(&a, "later", Some(now + Duration::minutes(10)), now))
            .await
            .unwrap();

        let counters = ctx.jobs.expire_links_at(now).await.unwrap();
        assert_eq!(counters.deleted_count, 0);
        assert!(ctx.collect_notifications(0).await.is_empty());
    }
}

// =============================================================================
// Enforce Quota Tests
// =============================================================================

#[cfg(test)]
mod enforce_quota_tests {
    use super::*;

    #[tokio::test]
    async fn test_evicts_least_recently_updated_first() {
        let mut ctx = create_test_context(LifecyclePolicy::default()).await;
        let over = create_user(&ctx.storage, "over", Role::User).await;
        let within = create_user(&ctx.storage, "within", Role::User).await;
        let base = now_secs() - Duration::days(10);
        let expiry = now_secs() + Duration::days(30);

        // 7 条永久链接（上限 5），3 条临时链接（上限 2）
        for i in 0..7 {
            ctx.storage
                .insert_link(&fields(&over, &format!("p{}", i), None, base + Duration::hours(i)))
                .await
                .unwrap();
        }
        for i in 0..3 {
            ctx.storage
                .insert_link(&fields(&over, &format!("t{}", i), Some(expiry), base + Duration::hours(i)))
                .await
                .unwrap();
        }
        ctx.storage
            .insert_link(&fields(&within, "ok", None, base))
            .await
            .unwrap();

        let counters = ctx.jobs.enforce_quota_at(now_secs()).await.unwrap();
        assert_eq!(counters.deleted_count, 3);
        assert_eq!(counters.affected_users, 1);

        let counts = ctx.storage.count_links(over.id).await.unwrap();
        assert_eq!((counts.permanent, counts.temporary), (5, 2));

        let mut evicted: Vec<String> = ctx
            .storage
            .list_archived(over.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.fields.code().to_string())
            .collect();
        evicted.sort();
        assert_eq!(evicted, vec!["p0", "p1", "t0"]);

        let notes = ctx.collect_notifications(1).await;
        assert_eq!(notes[0].0, over.id);
        assert_eq!(notes[0].1, NotificationKind::LinksEvicted);
        assert_eq!(notes[0].2.count, 3);

        assert_eq!(ctx.storage.count_links(within.id).await.unwrap().permanent, 1);
    }

    #[tokio::test]
    async fn test_oldest_created_order() {
        let policy = LifecyclePolicy {
            eviction_order: EvictionOrder::OldestCreated,
            ..LifecyclePolicy::default()
        };
        let ctx = create_test_context(policy).await;
        let over = create_user(&ctx.storage, "over", Role::User).await;
        let base = now_secs() - Duration::days(10);

        for i in 0..6 {
            let mut f = fields(&over, &format!("c{}", i), None, base + Duration::hours(i));
            // updated_at 顺序与 created_at 相反
            f.updated_at = base + Duration::hours(100 - i);
            ctx.storage.insert_link(&f).await.unwrap();
        }

        ctx.jobs.enforce_quota_at(now_secs()).await.unwrap();

        let archived = ctx.storage.list_archived(over.id).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].fields.code(), "c0");
    }

    #[tokio::test]
    async fn test_role_change_down_then_enforce() {
        let ctx = create_test_context(LifecyclePolicy::default()).await;
        let users = UserService::new(ctx.storage.clone(), QuotaLimits::default());
        let carol = create_user(&ctx.storage, "carol", Role::Premium).await;
        let base = now_secs() - Duration::days(1);

        for i in 0..8 {
            ctx.storage
                .insert_link(&fields(&carol, &format!("k{}", i), None, base + Duration::minutes(i)))
                .await
                .unwrap();
        }
        let carol = users.set_role(carol.id, Role::User).await.unwrap();
        assert_eq!(carol.max_num_links, 5);

        let counters = ctx.jobs.enforce_quota_at(now_secs()).await.unwrap();
        assert_eq!(counters.deleted_count, 3);
        assert_eq!(ctx.storage.count_links(carol.id).await.unwrap().permanent, 5);

        // 再跑一次不会再删除
        let again = ctx.jobs.enforce_quota_at(now_secs()).await.unwrap();
        assert_eq!(again.deleted_count, 0);
    }

    #[tokio::test]
    async fn test_user_within_quota_after_run() {
        let ctx = create_test_context(LifecyclePolicy::default()).await;
        let quota = QuotaPolicy::new(ctx.storage.clone(), QuotaLimits::default());
        let dave = create_user(&ctx.storage, "dave", Role::User).await;
        let base = now_secs() - Duration::days(2);
        let expiry = now_secs() + Duration::days(30);

        for i in 0..9 {
            ctx.storage
                .insert_link(&fields(&dave, &format!("d{}", i), None, base + Duration::minutes(i)))
                .await
                .unwrap();
        }
        for i in 0..6 {
            ctx.storage
                .insert_link(&fields(&dave, &format!("e{}", i), Some(expiry), base + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let counters = ctx.jobs.enforce_quota_at(now_secs()).await.unwrap();
        assert_eq!(counters.deleted_count, 8);
        assert_eq!(counters.affected_users, 1);
        assert_eq!(quota.excess(&dave).await.unwrap().total(), 0);

        let counts = ctx.storage.count_links(dave.id).await.unwrap();
        assert_eq!((counts.permanent, counts.temporary), (5, 2));
    }
}

// =============================================================================
// Purge Archive Tests
// =============================================================================

#[cfg(test)]
mod purge_archive_tests {
    use super::*;

    #[tokio::test]
    async fn test_retention_boundary_by_role() {
        let mut ctx = create_test_context(LifecyclePolicy::default()).await;
        let regular = create_user(&ctx.storage, "regular", Role::User).await;
        let premium = create_user(&ctx.storage, "premium", Role::Premium).await;
        let now = now_secs();

        // 恰好满 3 天：可删除
        let due = ctx
            .storage
            .insert_archived(&fields(&regular, "due", None, now), now - Duration::days(3))
            .await
            .unwrap();
        // 差 1 秒：保留
        let almost = ctx
            .storage
            .insert_archived(
                &fields(&regular, "almost", None, now),
                now - Duration::days(3) + Duration::seconds(1),
            )
            .await
            .unwrap();
        // premium 保留 6 天
        let premium_kept = ctx
            .storage
            .insert_archived(&fields(&premium, "prem", None, now), now - Duration::days(4))
            .await
            .unwrap();
        let premium_due = ctx
            .storage
            .insert_archived(&fields(&premium, "prem-old", None, now), now - Duration::days(7))
            .await
            .unwrap();

        let counters = ctx.jobs.purge_archive_at(now).await.unwrap();
        assert_eq!(counters.deleted_count, 2);

        assert!(ctx.storage.get_archived(due.id).await.unwrap().is_none());
        assert!(ctx.storage.get_archived(almost.id).await.unwrap().is_some());
        assert!(ctx.storage.get_archived(premium_kept.id).await.unwrap().is_some());
        assert!(ctx.storage.get_archived(premium_due.id).await.unwrap().is_none());

        let kinds: Vec<NotificationKind> = ctx
            .collect_notifications(2)
            .await
            .into_iter()
            .map(|(_, kind, _)| kind)
            .collect();
        assert!(kinds.iter().all(|k| *k == NotificationKind::LinkPurged));
    }

    #[tokio::test]
    async fn test_rows_past_shortest_retention_still_use_owner_role() {
        let mut ctx = create_test_context(LifecyclePolicy::default()).await;
        let admin = create_user(&ctx.storage, "admin", Role::Admin).await;
        let now = now_secs();

        // 已超过最短保留期（3 天），但 admin 保留 6 天
        let kept = ctx
            .storage
            .insert_archived(&fields(&admin, "adm", None, now), now - Duration::days(5))
            .await
            .unwrap();
        // 未到最短保留期的行不会被加载
        ctx.storage
            .insert_archived(&fields(&admin, "fresh", None, now), now - Duration::days(1))
            .await
            .unwrap();

        let counters = ctx.jobs.purge_archive_at(now).await.unwrap();
        assert_eq!(counters.deleted_count, 0);
        assert_eq!(counters.affected_users, 0);
        assert!(ctx.storage.get_archived(kept.id).await.unwrap().is_some());
        assert_eq!(ctx.storage.list_archived(admin.id).await.unwrap().len(), 2);
        assert!(ctx.collect_notifications(0).await.is_empty());
    }
}

// =============================================================================
// Notification Flush Tests
// =============================================================================

#[cfg(test)]
mod notification_flush_tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_waits_for_slow_notifier() {
        let mut ctx = create_slow_context(StdDuration::from_millis(300)).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let past = now_secs() - Duration::hours(1);
        ctx.storage
            .insert_link(&fields(&a, "gone", Some(past), past))
            .await
            .unwrap();

        let report = JobRunner::default().run_job(&ctx.jobs, JobKind::ExpireLinks).await;
        assert!(report.is_completed());
        assert!(ctx.notifications.try_recv().is_err());

        let undelivered = ctx.jobs.flush_notifications(StdDuration::from_secs(5)).await;
        assert_eq!(undelivered, 0);

        let (user_id, kind, payload) = ctx.notifications.try_recv().expect("notification delivered");
        assert_eq!(user_id, a.id);
        assert_eq!(kind, NotificationKind::LinksExpired);
        assert_eq!(payload.count, 1);
    }

    #[tokio::test]
    async fn test_flush_gives_up_after_limit() {
        let mut ctx = create_slow_context(StdDuration::from_secs(30)).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let past = now_secs() - Duration::hours(1);
        ctx.storage
            .insert_link(&fields(&a, "gone", Some(past), past))
            .await
            .unwrap();

        ctx.jobs.expire_links_at(now_secs()).await.unwrap();

        let undelivered = ctx.jobs.flush_notifications(StdDuration::from_millis(50)).await;
        assert_eq!(undelivered, 1);
        assert!(ctx.notifications.try_recv().is_err());

        // 已经清空，再次 flush 立即返回
        assert_eq!(ctx.jobs.flush_notifications(StdDuration::from_millis(50)).await, 0);
    }
}

// =============================================================================
// Runner Tests
// =============================================================================

#[cfg(test)]
mod runner_tests {
    use super::*;

    #[tokio::test]
    async fn test_runner_reports_completed_job() {
        let ctx = create_test_context(LifecyclePolicy::default()).await;
        let a = create_user(&ctx.storage, "user_a", Role::User).await;
        let past = now_secs() - Duration::hours(2);
        ctx.storage
            .insert_link(&fields(&a, "old", Some(past), past))
            .await
            .unwrap();

        let runner = JobRunner::new(RunnerConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        });
        let report = runner.run_job(&ctx.jobs, JobKind::ExpireLinks).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.deleted_count(), 1);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["data"]["deleted_count"], 1);
    }

    #[tokio::test]
    async fn test_runner_completes_each_job_kind_on_empty_store() {
        let ctx = create_test_context(LifecyclePolicy::default()).await;
        let runner = JobRunner::default();

        for kind in [JobKind::ExpireLinks, JobKind::EnforceQuota, JobKind::PurgeArchive] {
            let report = runner.run_job(&ctx.jobs, kind).await;
            assert_eq!(report.job, kind);
            assert!(report.is_completed());
            assert_eq!(report.deleted_count(), 0);
        }
    }
}
