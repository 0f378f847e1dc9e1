//! Soft-delete archive service
//!
//! Restores archived links back into the live table (re-running the
//! creation checks) and permanently purges archived records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::LifecyclePolicy;
use crate::errors::{LinkError, Result};
use crate::services::link_service::{check_code, check_original_link, write_with_generated_code};
use crate::services::notifier::{NotificationKind, NotificationPayload, Notifier, dispatch_notification};
use crate::services::quota::QuotaPolicy;
use crate::storage::{ArchivedLink, SeaOrmStorage, ShortenedLink, User};

/// Single failed batch item
#[derive(Debug, Clone)]
pub struct BatchFailedItem {
    pub id: i64,
    pub reason: LinkError,
}

/// Result of restoring a selection of archived links
#[derive(Debug, Clone, Default)]
pub struct BatchRestoreResult {
    pub restored: Vec<ShortenedLink>,
    pub failed: Vec<BatchFailedItem>,
}

pub struct ArchiveService {
    storage: Arc<SeaOrmStorage>,
    quota: QuotaPolicy,
    policy: Arc<LifecyclePolicy>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ArchiveService {
    pub fn new(storage: Arc<SeaOrmStorage>, policy: Arc<LifecyclePolicy>) -> Self {
        let quota = QuotaPolicy::new(storage.clone(), policy.quota);
        Self {
            storage,
            quota,
            policy,
            notifier: None,
        }
    }

    /// 恢复成功后通知链接所有者
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    async fn require_archived(&self, user: &User, archived_id: i64) -> Result<ArchivedLink> {
        self.storage
            .get_archived_for_user(user.id, archived_id)
            .await?
            .ok_or_else(|| {
                LinkError::not_found(format!("Archived link {} not found", archived_id))
            })
    }

    /// Restore an archived link
    ///
    /// An expiry that has passed, or falls within the minimum lead time,
    /// is replaced with `now + default_expiry`. Quota and code uniqueness
    /// are checked again; on any failure the archive row is kept.
    pub async fn restore(&self, user: &User, archived_id: i64) -> Result<ShortenedLink> {
        self.restore_at(user, archived_id, Utc::now()).await
    }

    pub async fn restore_at(
        &self,
        user: &User,
        archived_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ShortenedLink> {
        let archived = self.require_archived(user, archived_id).await?;

        let mut fields = archived.fields.clone();
        fields.refresh_expiry(
            now + self.policy.min_expiry_lead(),
            now + self.policy.default_expiry(),
        );

        check_original_link(&fields.original_link)?;
        if let Some(code) = &fields.shortened_link {
            check_code(code)?;
        }

        self.quota
            .ensure_can_create(user, fields.is_temporary())
            .await?;

        // 恢复视为重新创建
        fields.created_at = now;
        fields.updated_at = now;

        let attempts = self.policy.archive_copy_attempts;
        let link = if fields.shortened_link.is_some() {
            self.storage
                .restore_archived(archived.id, user.id, &fields, attempts)
                .await?
        } else {
            // 没有短码的归档按创建流程生成短码，冲突时换码重试
            let (archived_id, owner) = (archived.id, user.id);
            write_with_generated_code(&fields, &self.policy, |candidate| async move {
                self.storage
                    .restore_archived(archived_id, owner, &candidate, attempts)
                    .await
            })
            .await?
        };

        if let Some(notifier) = &self.notifier {
            dispatch_notification(
                notifier.clone(),
                user.clone(),
                NotificationKind::LinkRestored,
                NotificationPayload::from_links([&link]),
            );
        }

        Ok(link)
    }

    /// 逐条恢复，失败的条目记录原因后继续
    pub async fn restore_selected(&self, user: &User, ids: &[i64]) -> Result<BatchRestoreResult> {
        let mut result = BatchRestoreResult::default();

        for &id in ids {
            match self.restore(user, id).await {
                Ok(link) => result.restored.push(link),
                Err(e @ (LinkError::DatabaseConnection(_) | LinkError::DatabaseConfig(_))) => {
                    return Err(e);
                }
                Err(reason) => result.failed.push(BatchFailedItem { id, reason }),
            }
        }

        info!(
            "ArchiveService: user {} restored {} links ({} failed)",
            user.id,
            result.restored.len(),
            result.failed.len()
        );
        Ok(result)
    }

    /// Unconditional permanent delete; returns whether the record existed
    pub async fn purge(&self, archived_id: i64) -> Result<bool> {
        self.storage.purge_archived(archived_id).await
    }

    /// Owner-scoped permanent delete
    pub async fn purge_for_user(&self, user: &User, archived_id: i64) -> Result<()> {
        let archived = self.require_archived(user, archived_id).await?;
        if !self.storage.purge_archived(archived.id).await? {
            return Err(LinkError::not_found(format!(
                "Archived link {} not found",
                archived_id
            )));
        }

        info!(
            "ArchiveService: user {} purged archived link {}",
            user.id, archived_id
        );
        Ok(())
    }

    pub async fn purge_selected(&self, user: &User, ids: &[i64]) -> Result<u64> {
        self.storage.purge_archived_for_user(user.id, ids).await
    }

    pub async fn get(&self, user: &User, archived_id: i64) -> Result<ArchivedLink> {
        self.require_archived(user, archived_id).await
    }

    pub async fn get_by_code(&self, user: &User, code: &str) -> Result<ArchivedLink> {
        self.storage
            .get_archived_by_code(user.id, code)
            .await?
            .ok_or_else(|| LinkError::not_found(format!("Archived link '{}' not found", code)))
    }

    pub async fn list(&self, user: &User) -> Result<Vec<ArchivedLink>> {
        self.storage.list_archived(user.id).await
    }

    /// 归档记录的永久删除时间
    pub fn purge_at(&self, user: &User, archived: &ArchivedLink) -> DateTime<Utc> {
        archived.purge_at(self.policy.retention(user.role))
    }
}
