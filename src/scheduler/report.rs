use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::Result;

/// 任务状态（序列化为大写）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobStatus {
    Completed,
    Failed,
    /// 本次失败，稍后重试
    Retry,
}

/// The three reconciliation jobs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    ExpireLinks,
    EnforceQuota,
    PurgeArchive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    /// 移入归档或永久删除的行数
    pub deleted_count: u64,
    /// 收到通知的用户数
    pub affected_users: usize,
}

/// `{status, message, data, error?}` report returned by every job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: JobKind,
    pub status: JobStatus,
    pub message: String,
    pub data: Option<JobCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 已执行的次数（含本次）
    pub attempt: u32,
}

impl JobReport {
    pub fn completed(job: JobKind, counters: JobCounters, attempt: u32) -> Self {
        Self {
            job,
            status: JobStatus::Completed,
            message: format!(
                "{} finished: {} rows removed, {} users notified",
                job, counters.deleted_count, counters.affected_users
            ),
            data: Some(counters),
            error: None,
            attempt,
        }
    }

    pub fn retry(job: JobKind, error: String, attempt: u32, delay_ms: u64) -> Self {
        Self {
            job,
            status: JobStatus::Retry,
            message: format!(
                "{} failed on attempt {}; retrying in {} ms",
                job, attempt, delay_ms
            ),
            data: None,
            error: Some(error),
            attempt,
        }
    }

    pub fn failed(job: JobKind, error: String, attempt: u32) -> Self {
        Self {
            job,
            status: JobStatus::Failed,
            message: format!("{} failed after {} attempts", job, attempt),
            data: None,
            error: Some(error),
            attempt,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn deleted_count(&self) -> u64 {
        self.data.map(|d| d.deleted_count).unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
