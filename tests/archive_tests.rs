//! ArchiveService tests
//!
//! Restore and purge of soft-deleted links.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use linkcycle::config::{LifecyclePolicy, QuotaLimits};
use linkcycle::errors::LinkError;
use linkcycle::services::{
    ArchiveService, CreateLinkRequest, LinkService, NotificationKind, NotificationPayload,
    Notifier, RedirectResolver, Resolution, UserService,
};
use linkcycle::storage::backend::SeaOrmStorage;
use linkcycle::storage::{LinkFields, RetryConfig, Role, User};
use tempfile::TempDir;
use tokio::sync::mpsc;

// =============================================================================
// Test Setup
// =============================================================================

/// Notifier that forwards every notification to a channel
struct RecordingNotifier {
    tx: mpsc::UnboundedSender<(i64, NotificationKind, NotificationPayload)>,
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

struct TestContext {
    storage: Arc<SeaOrmStorage>,
    links: LinkService,
    archive: ArchiveService,
    resolver: RedirectResolver,
    notifications: mpsc::UnboundedReceiver<(i64, NotificationKind, NotificationPayload)>,
    _temp_dir: TempDir,
}

async fn create_test_context() -> TestContext {
    create_test_context_with(LifecyclePolicy::default()).await
}

async fn create_test_context_with(policy: LifecyclePolicy) -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("archive.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = Arc::new(
        SeaOrmStorage::new(&db_url, "sqlite", RetryConfig::default())
            .await
            .expect("Failed to create storage"),
    );
    let policy = Arc::new(policy);
    let (tx, rx) = mpsc::unbounded_channel();

    TestContext {
        links: LinkService::new(storage.clone(), policy.clone()),
        archive: ArchiveService::new(storage.clone(), policy)
            .with_notifier(Arc::new(RecordingNotifier { tx })),
        resolver: RedirectResolver::new(storage.clone()),
        storage,
        notifications: rx,
        _temp_dir: temp_dir,
    }
}

async fn create_user(storage: &Arc<SeaOrmStorage>, username: &str, role: Role) -> User {
    UserService::new(storage.clone(), QuotaLimits::default())
        .create_user(username, role, false)
        .await
        .expect("Failed to create user")
}

fn archived_fields(user: &User, code: &str, remove_at: Option<DateTime<Utc>>) -> LinkFields {
    let now = Utc::now();
    LinkFields {
        original_link: format!("https://example.com/{}", code),
        shortened_link: Some(code.to_string()),
        created_at: now - Duration::days(1),
        updated_at: now - Duration::days(1),
        remove_at,
        is_active: true,
        user_id: user.id,
    }
}

// =============================================================================
// Restore Tests
// =============================================================================

#[cfg(test)]
mod restore_tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_delete_restore_resolve() {
        let mut ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let link = ctx
            .links
            .create_link(&alice, CreateLinkRequest::new("https://trip.dev/page").with_code("trip"))
            .await
            .unwrap();

        let first = ctx.links.delete_link(&alice, link.id).await.unwrap();
        assert!(matches!(
            ctx.resolver.resolve("trip").await,
            Err(LinkError::NotFound(_))
        ));

        let restored = ctx.archive.restore(&alice, first.id).await.unwrap();
        assert_eq!(restored.fields.code(), "trip");
        assert_eq!(
            ctx.resolver.resolve("trip").await.unwrap(),
            Resolution::Redirect("https://trip.dev/page".to_string())
        );
        assert!(ctx.storage.get_archived(first.id).await.unwrap().is_none());

        // 再次删除得到等价的归档记录
        let second = ctx.links.delete_link(&alice, restored.id).await.unwrap();
        assert_eq!(second.fields.original_link, first.fields.original_link);
        assert_eq!(second.fields.shortened_link, first.fields.shortened_link);
        assert_eq!(second.fields.remove_at, first.fields.remove_at);
        assert_eq!(second.fields.is_active, first.fields.is_active);
        assert_eq!(second.fields.user_id, first.fields.user_id);

        let (user_id, kind, payload) =
            tokio::time::timeout(StdDuration::from_secs(2), ctx.notifications.recv())
                .await
                .expect("notification not delivered")
                .expect("channel closed");
        assert_eq!(user_id, alice.id);
        assert_eq!(kind, NotificationKind::LinkRestored);
        assert_eq!(payload.count, 1);
    }

    #[tokio::test]
    async fn test_restore_resets_expiry_within_floor() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;

        // 30 秒后过期：低于一分钟下限，视为已过期
        let archived = ctx
            .storage
            .insert_archived(
                &archived_fields(&alice, "soon", Some(Utc::now() + Duration::seconds(30))),
                Utc::now() - Duration::hours(1),
            )
            .await
            .unwrap();

        let before = Utc::now();
        let restored = ctx.archive.restore(&alice, archived.id).await.unwrap();
        let remove_at = restored.fields.remove_at.unwrap();

        assert!(remove_at >= before + Duration::days(1) - Duration::seconds(1));
        assert!(restored.is_functional());
    }

    #[tokio::test]
    async fn test_restore_keeps_future_expiry() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let expiry = Utc::now() + Duration::hours(6);

        let archived = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "later", Some(expiry)), Utc::now())
            .await
            .unwrap();

        let restored = ctx.archive.restore(&alice, archived.id).await.unwrap();
        assert_eq!(restored.fields.remove_at, archived.fields.remove_at);
    }

    #[tokio::test]
    async fn test_restore_over_quota_keeps_archive_row() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;

        for i in 0..5 {
            ctx.links
                .create_link(&alice, CreateLinkRequest::new(format!("https://example.com/{}", i)))
                .await
                .unwrap();
        }
        let archived = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "extra", None), Utc::now())
            .await
            .unwrap();

        let result = ctx.archive.restore(&alice, archived.id).await;
        assert!(matches!(result, Err(LinkError::QuotaExceeded(_))));
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_taken_code_is_duplicate() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let bob = create_user(&ctx.storage, "bob", Role::User).await;

        let link = ctx
            .links
            .create_link(&alice, CreateLinkRequest::new("https://alice.dev").with_code("dup"))
            .await
            .unwrap();
        let archived = ctx.links.delete_link(&alice, link.id).await.unwrap();

        ctx.links
            .create_link(&bob, CreateLinkRequest::new("https://bob.dev").with_code("dup"))
            .await
            .unwrap();

        let result = ctx.archive.restore(&alice, archived.id).await;
        assert!(matches!(result, Err(LinkError::DuplicateCode(_))));

        // 事务回滚：归档行还在，alice 没有多出活动链接
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_some());
        assert_eq!(ctx.storage.count_links(alice.id).await.unwrap().permanent, 0);
    }

    #[tokio::test]
    async fn test_restore_without_code_generates_one() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let archived = ctx
            .storage
            .insert_archived(
                &LinkFields {
                    shortened_link: None,
                    ..archived_fields(&alice, "unused", None)
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let restored = ctx.archive.restore(&alice, archived.id).await.unwrap();
        let code = restored.fields.shortened_link.expect("code generated on restore");
        assert_eq!(code.len(), 10);
        assert!(linkcycle::utils::is_valid_short_code(&code));
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_without_code_exhausts_generation() {
        let policy = LifecyclePolicy {
            code_length: 1,
            ..LifecyclePolicy::default()
        };
        let ctx = create_test_context_with(policy).await;
        let admin = create_user(&ctx.storage, "admin", Role::Admin).await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;

        // 占满所有单字符短码
        let alphabet = ('A'..='Z')
            .chain('a'..='z')
            .chain('0'..='9')
            .chain(['-', '_']);
        for c in alphabet {
            ctx.storage
                .insert_link(&archived_fields(&admin, &c.to_string(), None))
                .await
                .unwrap();
        }

        let archived = ctx
            .storage
            .insert_archived(
                &LinkFields {
                    shortened_link: None,
                    ..archived_fields(&alice, "unused", None)
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let result = ctx.archive.restore(&alice, archived.id).await;
        assert!(
            matches!(result, Err(LinkError::CodeGenerationExhausted(_))),
            "expected CodeGenerationExhausted, got {:?}",
            result
        );
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_some());
        assert_eq!(ctx.storage.count_links(alice.id).await.unwrap().permanent, 0);
    }

    #[tokio::test]
    async fn test_restore_other_users_archive_is_not_found() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let mallory = create_user(&ctx.storage, "mallory", Role::User).await;
        let archived = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "private", None), Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            ctx.archive.restore(&mallory, archived.id).await,
            Err(LinkError::NotFound(_))
        ));
        assert!(matches!(
            ctx.archive.restore(&alice, archived.id + 1000).await,
            Err(LinkError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_selected_reports_failures() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let bob = create_user(&ctx.storage, "bob", Role::User).await;

        let ok = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "fine", None), Utc::now())
            .await
            .unwrap();
        let clash = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "clash", None), Utc::now())
            .await
            .unwrap();
        ctx.links
            .create_link(&bob, CreateLinkRequest::new("https://bob.dev").with_code("clash"))
            .await
            .unwrap();

        let result = ctx
            .archive
            .restore_selected(&alice, &[ok.id, clash.id])
            .await
            .unwrap();

        assert_eq!(result.restored.len(), 1);
        assert_eq!(result.restored[0].fields.code(), "fine");
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, clash.id);
        assert!(matches!(result.failed[0].reason, LinkError::DuplicateCode(_)));
    }
}

// =============================================================================
// Purge / Listing Tests
// =============================================================================

#[cfg(test)]
mod purge_tests {
    use super::*;

    #[tokio::test]
    async fn test_purge_is_unconditional() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let archived = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "old", None), Utc::now())
            .await
            .unwrap();

        assert!(ctx.archive.purge(archived.id).await.unwrap());
        assert!(!ctx.archive.purge(archived.id).await.unwrap());
        assert!(ctx.archive.list(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_for_user_is_owner_scoped() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let mallory = create_user(&ctx.storage, "mallory", Role::User).await;
        let archived = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "keep", None), Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            ctx.archive.purge_for_user(&mallory, archived.id).await,
            Err(LinkError::NotFound(_))
        ));
        assert_eq!(ctx.archive.purge_selected(&mallory, &[archived.id]).await.unwrap(), 0);
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_some());

        ctx.archive.purge_for_user(&alice, archived.id).await.unwrap();
        assert!(ctx.storage.get_archived(archived.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_code_returns_latest_archive() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let now = Utc::now();

        ctx.storage
            .insert_archived(&archived_fields(&alice, "again", None), now - Duration::days(2))
            .await
            .unwrap();
        let latest = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "again", None), now)
            .await
            .unwrap();

        let found = ctx.archive.get_by_code(&alice, "again").await.unwrap();
        assert_eq!(found.id, latest.id);

        let listed = ctx.archive.list(&alice).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, latest.id);
    }

    #[tokio::test]
    async fn test_purge_at_depends_on_role() {
        let ctx = create_test_context().await;
        let alice = create_user(&ctx.storage, "alice", Role::User).await;
        let carol = create_user(&ctx.storage, "carol", Role::Premium).await;
        let removed_at = Utc::now();

        let a = ctx
            .storage
            .insert_archived(&archived_fields(&alice, "a", None), removed_at)
            .await
            .unwrap();
        let c = ctx
            .storage
            .insert_archived(&archived_fields(&carol, "c", None), removed_at)
            .await
            .unwrap();

        assert_eq!(ctx.archive.purge_at(&alice, &a), a.removed_at + Duration::days(3));
        assert_eq!(ctx.archive.purge_at(&carol, &c), c.removed_at + Duration::days(6));
    }
}
