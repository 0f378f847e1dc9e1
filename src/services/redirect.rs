use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{LinkError, Result};
use crate::storage::{SeaOrmStorage, ShortenedLink};
use crate::utils::is_valid_short_code;

/// Outcome of resolving a short code that exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 跳转到目标链接
    Redirect(String),
    /// 链接存在但已停用或已过期
    NotFunctional(ShortenedLink),
}

/// Read-only short code resolver
pub struct RedirectResolver {
    storage: Arc<SeaOrmStorage>,
}

impl RedirectResolver {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    pub async fn resolve(&self, code: &str) -> Result<Resolution> {
        self.resolve_at(code, Utc::now()).await
    }

    pub async fn resolve_at(&self, code: &str, now: DateTime<Utc>) -> Result<Resolution> {
        // 格式不合法的短码不可能存在，不查库
        if !is_valid_short_code(code) {
            debug!("Rejected malformed short code: {}", code);
            return Err(LinkError::not_found(format!("Link '{}' not found", code)));
        }

        let link = self
            .storage
            .get_link_by_code(code)
            .await?
            .ok_or_else(|| LinkError::not_found(format!("Link '{}' not found", code)))?;

        if link.is_functional_at(now) {
            Ok(Resolution::Redirect(link.fields.original_link))
        } else {
            debug!("Link {} ({}) is inactive or expired", link.id, code);
            Ok(Resolution::NotFunctional(link))
        }
    }
}
