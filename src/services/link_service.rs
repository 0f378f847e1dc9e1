//! Link management service
//!
//! Creation, update, activation and deletion of a user's short links.
//! Deletion never drops a row: the link is moved into the soft-delete
//! archive in the same transaction.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::LifecyclePolicy;
use crate::errors::{LinkError, Result};
use crate::services::quota::QuotaPolicy;
use crate::storage::{ArchiveStamp, ArchivedLink, LinkFields, SeaOrmStorage, ShortenedLink, User};
use crate::utils::url_validator::validate_url;
use crate::utils::{MAX_CODE_LENGTH, generate_code, is_valid_short_code};

// ============ Request DTOs ============

/// Request to create a new link
#[derive(Debug, Clone, Default)]
pub struct CreateLinkRequest {
    /// Target URL
    pub original_link: String,
    /// Short code (optional, will be generated if not provided)
    pub shortened_link: Option<String>,
    /// Expiration time; `Some` makes the link temporary
    pub remove_at: Option<DateTime<Utc>>,
    /// Temporary link without an explicit expiration: expires after the
    /// policy's default lifetime
    pub temporary: bool,
}

impl CreateLinkRequest {
    pub fn new(original_link: impl Into<String>) -> Self {
        Self {
            original_link: original_link.into(),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.shortened_link = Some(code.into());
        self
    }

    pub fn expiring_at(mut self, remove_at: DateTime<Utc>) -> Self {
        self.remove_at = Some(remove_at);
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }
}

/// Partial update of an existing link; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub original_link: Option<String>,
    pub shortened_link: Option<String>,
    /// `Some(None)` turns a temporary link into a permanent one
    pub remove_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
}

// ============ Shared validation ============

pub(crate) fn check_original_link(original_link: &str) -> Result<()> {
    validate_url(original_link).map_err(|e| LinkError::invalid_format(e.to_string()))
}

pub(crate) fn check_code(code: &str) -> Result<()> {
    if is_valid_short_code(code) {
        Ok(())
    } else {
        Err(LinkError::invalid_format(format!(
            "Invalid short code '{}'. Use 1-{} letters, digits, '-' or '_'.",
            code, MAX_CODE_LENGTH
        )))
    }
}

/// 调用方给出的 remove_at 必须晚于 now + 最小提前量
pub(crate) fn check_remove_at(
    remove_at: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &LifecyclePolicy,
) -> Result<()> {
    let earliest = now + policy.min_expiry_lead();
    if remove_at < earliest {
        return Err(LinkError::invalid_expiry(format!(
            "Expiration {} must be at least {} seconds in the future",
            remove_at.to_rfc3339(),
            policy.min_expiry_lead_secs
        )));
    }
    Ok(())
}

/// 为 `fields` 生成短码并写入；唯一索引冲突时换新短码重试
///
/// 创建链接与恢复无短码的归档共用同一套 insert-or-retry 逻辑。
pub(crate) async fn write_with_generated_code<T, F, Fut>(
    fields: &LinkFields,
    policy: &LifecyclePolicy,
    mut write: F,
) -> Result<T>
where
    F: FnMut(LinkFields) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.code_generation_attempts.max(1);
    for attempt in 1..=attempts {
        let mut candidate = fields.clone();
        candidate.shortened_link = Some(generate_code(policy.code_length));
        let code = candidate.code().to_string();

        match write(candidate).await {
            Ok(written) => return Ok(written),
            Err(LinkError::DuplicateCode(_)) => {
                debug!(
                    "Generated code '{}' collided (attempt {}/{})",
                    code, attempt, attempts
                );
            }
            Err(e) => return Err(e),
        }
    }

    warn!(
        "Could not find a free short code for user {} after {} attempts",
        fields.user_id, attempts
    );
    Err(LinkError::code_generation_exhausted(format!(
        "No free short code found after {} attempts",
        attempts
    )))
}

// ============ LinkService Implementation ============

/// Service for a user's live links
pub struct LinkService {
    storage: Arc<SeaOrmStorage>,
    quota: QuotaPolicy,
    policy: Arc<LifecyclePolicy>,
}

impl LinkService {
    pub fn new(storage: Arc<SeaOrmStorage>, policy: Arc<LifecyclePolicy>) -> Self {
        let quota = QuotaPolicy::new(storage.clone(), policy.quota);
        Self {
            storage,
            quota,
            policy,
        }
    }

    fn archive_stamp(&self, now: DateTime<Utc>) -> ArchiveStamp {
        ArchiveStamp::new(now, self.policy.default_expiry())
    }

    async fn require_link(&self, user: &User, id: i64) -> Result<ShortenedLink> {
        self.storage
            .get_link_for_user(user.id, id)
            .await?
            .ok_or_else(|| LinkError::not_found(format!("Link {} not found", id)))
    }

    // ============ CRUD Operations ============

    /// Create a new short link
    ///
    /// Without an explicit code, a random one is generated and inserted;
    /// a collision on the unique index triggers a fresh code, up to
    /// `code_generation_attempts` times.
    pub async fn create_link(&self, user: &User, req: CreateLinkRequest) -> Result<ShortenedLink> {
        let now = Utc::now();

        check_original_link(&req.original_link)?;
        // 只校验调用方给出的过期时间；默认有效期不受最小提前量限制
        let remove_at = match req.remove_at {
            Some(remove_at) => {
                check_remove_at(remove_at, now, &self.policy)?;
                Some(remove_at)
            }
            None if req.temporary => Some(now + self.policy.default_expiry()),
            None => None,
        };
        let explicit_code = req.shortened_link.filter(|c| !c.is_empty());
        if let Some(code) = &explicit_code {
            check_code(code)?;
        }

        self.quota
            .ensure_can_create(user, remove_at.is_some())
            .await?;

        let fields = LinkFields {
            original_link: req.original_link,
            shortened_link: explicit_code.clone(),
            created_at: now,
            updated_at: now,
            remove_at,
            is_active: true,
            user_id: user.id,
        };

        if explicit_code.is_some() {
            return self.storage.insert_link(&fields).await;
        }

        write_with_generated_code(&fields, &self.policy, |candidate| async move {
            self.storage.insert_link(&candidate).await
        })
        .await
    }

    /// Update an existing link
    ///
    /// Quota is checked only when the link moves between the permanent
    /// and temporary categories, against the target category.
    pub async fn update_link(&self, user: &User, id: i64, update: LinkUpdate) -> Result<ShortenedLink> {
        let now = Utc::now();
        let mut link = self.require_link(user, id).await?;
        let was_temporary = link.is_temporary();

        if let Some(original_link) = update.original_link {
            check_original_link(&original_link)?;
            link.fields.original_link = original_link;
        }
        if let Some(code) = update.shortened_link {
            check_code(&code)?;
            link.fields.shortened_link = Some(code);
        }
        if let Some(remove_at) = update.remove_at {
            if let Some(at) = remove_at
                && link.fields.remove_at != Some(at)
            {
                check_remove_at(at, now, &self.policy)?;
            }
            link.fields.remove_at = remove_at;
        }
        if let Some(is_active) = update.is_active {
            link.fields.is_active = is_active;
        }

        let is_temporary = link.is_temporary();
        if is_temporary != was_temporary {
            self.quota.ensure_can_create(user, is_temporary).await?;
        }

        link.fields.updated_at = now;
        let saved = self.storage.save_link(&link).await?;
        info!("LinkService: updated link {} ({})", saved.id, saved.fields.code());
        Ok(saved)
    }

    async fn set_active(&self, user: &User, id: i64, active: bool) -> Result<ShortenedLink> {
        let mut link = self.require_link(user, id).await?;
        link.fields.is_active = active;
        link.fields.updated_at = Utc::now();
        self.storage.save_link(&link).await
    }

    pub async fn activate(&self, user: &User, id: i64) -> Result<ShortenedLink> {
        self.set_active(user, id, true).await
    }

    pub async fn deactivate(&self, user: &User, id: i64) -> Result<ShortenedLink> {
        self.set_active(user, id, false).await
    }

    /// Move a link into the archive
    pub async fn delete_link(&self, user: &User, id: i64) -> Result<ArchivedLink> {
        let moved = self
            .storage
            .archive_link(
                id,
                Some(user.id),
                self.archive_stamp(Utc::now()),
                self.policy.archive_copy_attempts,
            )
            .await?;

        info!(
            "LinkService: user {} deleted link {} ({})",
            user.id,
            id,
            moved.link.fields.code()
        );
        Ok(moved.archived)
    }

    pub async fn get_link(&self, user: &User, id: i64) -> Result<ShortenedLink> {
        self.require_link(user, id).await
    }

    /// 查找属于该用户的短码
    pub async fn get_link_by_code(&self, user: &User, code: &str) -> Result<ShortenedLink> {
        self.storage
            .get_link_by_code(code)
            .await?
            .filter(|link| link.fields.user_id == user.id)
            .ok_or_else(|| LinkError::not_found(format!("Link '{}' not found", code)))
    }

    pub async fn list_links(&self, user: &User) -> Result<Vec<ShortenedLink>> {
        self.storage.list_links(user.id).await
    }

    // ============ Batch Operations ============

    /// 批量删除（移入归档），返回实际删除的数量
    pub async fn delete_selected(&self, user: &User, ids: &[i64]) -> Result<u64> {
        let moved = self
            .storage
            .archive_links_for_user(
                user.id,
                ids,
                self.archive_stamp(Utc::now()),
                self.policy.archive_copy_attempts,
            )
            .await?;
        Ok(moved.len() as u64)
    }

    pub async fn activate_selected(&self, user: &User, ids: &[i64]) -> Result<u64> {
        self.storage
            .set_links_active(user.id, ids, true, Utc::now())
            .await
    }

    pub async fn deactivate_selected(&self, user: &User, ids: &[i64]) -> Result<u64> {
        self.storage
            .set_links_active(user.id, ids, false, Utc::now())
            .await
    }
}
