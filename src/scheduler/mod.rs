//! Periodic lifecycle reconciliation
//!
//! - `expire_links`: 把到期的临时链接移入归档
//! - `enforce_quota`: 淘汰超出角色上限的链接
//! - `purge_archive`: 永久删除超过保留期的归档

mod jobs;
mod report;
mod runner;

pub use jobs::LifecycleJobs;
pub use report::{JobCounters, JobKind, JobReport, JobStatus};
pub use runner::{JobRunner, RunnerConfig};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SchedulerConfig;

impl SchedulerConfig {
    pub fn interval_for(&self, kind: JobKind) -> Duration {
        let secs = match kind {
            JobKind::ExpireLinks => self.expire_links_interval_secs,
            JobKind::EnforceQuota => self.enforce_quota_interval_secs,
            JobKind::PurgeArchive => self.purge_archive_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

/// 启动一个后台任务：首次延迟后按固定间隔运行
///
/// 上一次运行（含重试）结束后才开始计算下一次的间隔。
pub fn spawn_job(
    jobs: Arc<LifecycleJobs>,
    runner: JobRunner,
    kind: JobKind,
    initial_delay: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        "{} background task started (interval: {} s)",
        kind,
        interval.as_secs()
    );

    tokio::spawn(async move {
        tokio::time::sleep(initial_delay).await;

        loop {
            // run_job 从不返回错误，失败已记录在报告里
            let report = runner.run_job(&jobs, kind).await;
            if let Ok(json) = report.to_json() {
                tracing::debug!("{}", json);
            }

            tokio::time::sleep(interval).await;
        }
    })
}

/// 按配置启动全部三个任务
pub fn spawn_schedule(jobs: Arc<LifecycleJobs>, config: &SchedulerConfig) -> Vec<JoinHandle<()>> {
    let runner = JobRunner::new(RunnerConfig::from(config));
    let initial_delay = Duration::from_secs(config.initial_delay_secs);

    [
        JobKind::ExpireLinks,
        JobKind::EnforceQuota,
        JobKind::PurgeArchive,
    ]
    .into_iter()
    .map(|kind| {
        spawn_job(
            jobs.clone(),
            runner,
            kind,
            initial_delay,
            config.interval_for(kind),
        )
    })
    .collect()
}
