//! Service layer for business logic
//!
//! Link, archive, quota, redirect and account operations on top of
//! `SeaOrmStorage`, shared by the scheduler and any host interface.

mod archive_service;
mod link_service;
pub mod notifier;
pub mod quota;
mod redirect;
mod users;

pub use archive_service::*;
pub use link_service::{CreateLinkRequest, LinkService, LinkUpdate};
pub use notifier::{
    LinkSummary, NotificationKind, NotificationPayload, Notifier, TracingNotifier,
    deliver_notification, dispatch_notification,
};
pub use quota::{QuotaExcess, QuotaPolicy};
pub use redirect::{RedirectResolver, Resolution};
pub use users::{UserService, apply_role_caps};
