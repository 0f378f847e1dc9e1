//! Owner notifications for lifecycle events
//!
//! Delivery (email, in-app inbox) is owned by the host application; this
//! module only defines the hook and a default implementation that logs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::Result;
use crate::storage::{ArchivedLink, ShortenedLink, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// 临时链接到期，已移入归档
    LinksExpired,
    /// 超出配额，被定时任务淘汰
    LinksEvicted,
    LinkRestored,
    /// 归档保留期已过，永久删除
    LinkPurged,
}

/// 通知中携带的链接摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub id: i64,
    pub original_link: String,
    pub shortened_link: Option<String>,
    pub remove_at: Option<DateTime<Utc>>,
}

impl From<&ShortenedLink> for LinkSummary {
    fn from(link: &ShortenedLink) -> Self {
        Self {
            id: link.id,
            original_link: link.fields.original_link.clone(),
            shortened_link: link.fields.shortened_link.clone(),
            remove_at: link.fields.remove_at,
        }
    }
}

impl From<&ArchivedLink> for LinkSummary {
    fn from(archived: &ArchivedLink) -> Self {
        Self {
            id: archived.id,
            original_link: archived.fields.original_link.clone(),
            shortened_link: archived.fields.shortened_link.clone(),
            remove_at: archived.fields.remove_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub count: usize,
    pub links: Vec<LinkSummary>,
}

impl NotificationPayload {
    pub fn from_links<'a, T>(links: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
        LinkSummary: From<&'a T>,
    {
        let links: Vec<LinkSummary> = links.into_iter().map(LinkSummary::from).collect();
        Self {
            count: links.len(),
            links,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user: &User,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()>;
}

/// 默认实现：只写日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        user: &User,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<()> {
        info!(
            user_id = user.id,
            username = %user.username,
            kind = %kind,
            count = payload.count,
            "Lifecycle notification"
        );
        Ok(())
    }
}

/// 发送一条通知，失败只记录日志
pub async fn deliver_notification(
    notifier: Arc<dyn Notifier>,
    user: User,
    kind: NotificationKind,
    payload: NotificationPayload,
) {
    if let Err(e) = notifier.notify(&user, kind, &payload).await {
        warn!(
            "Failed to send {} notification to user {}: {}",
            kind, user.id, e
        );
    }
}

/// 在事务提交之后异步发送通知
///
/// 返回的句柄可以被 await；直接丢弃则任务在后台继续运行。
pub fn dispatch_notification(
    notifier: Arc<dyn Notifier>,
    user: User,
    kind: NotificationKind,
    payload: NotificationPayload,
) -> JoinHandle<()> {
    tokio::spawn(deliver_notification(notifier, user, kind, payload))
}
