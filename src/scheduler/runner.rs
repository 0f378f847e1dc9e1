//! Job runner with retry and exponential backoff
//!
//! A run counts as consumed only once the job future returns. Any error
//! becomes a `RETRY` report followed by a delayed re-run, until the retry
//! budget is spent and the run ends as `FAILED`. Errors never escape.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use super::jobs::LifecycleJobs;
use super::report::{JobCounters, JobKind, JobReport};
use crate::config::SchedulerConfig;
use crate::errors::Result;
use crate::storage::backend::retry::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl From<&SchedulerConfig> for RunnerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobRunner {
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    /// 运行一个任务，返回最终报告
    pub async fn run<F, Fut>(&self, kind: JobKind, job: F) -> JobReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobCounters>>,
    {
        let mut reports = self.run_collect(kind, job).await;
        match reports.pop() {
            Some(report) => report,
            None => JobReport::failed(kind, "job was never started".to_string(), 0),
        }
    }

    /// 运行一个任务，返回每次尝试的报告（RETRY ... 以及最终的 COMPLETED / FAILED）
    pub async fn run_collect<F, Fut>(&self, kind: JobKind, mut job: F) -> Vec<JobReport>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobCounters>>,
    {
        let mut reports = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match job().await {
                Ok(counters) => {
                    let report = JobReport::completed(kind, counters, attempt);
                    info!("{}", report.message);
                    reports.push(report);
                    return reports;
                }
                Err(e) if attempt <= self.config.max_retries => {
                    let delay =
                        calculate_backoff(attempt, self.config.base_delay_ms, self.config.max_delay_ms);
                    let report = JobReport::retry(kind, e.to_string(), attempt, delay);
                    warn!("{}: {}", report.message, e);
                    reports.push(report);
                    sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    let report = JobReport::failed(kind, e.to_string(), attempt);
                    error!("{}: {}", report.message, e);
                    reports.push(report);
                    return reports;
                }
            }
        }
    }

    pub async fn run_job(&self, jobs: &LifecycleJobs, kind: JobKind) -> JobReport {
        self.run(kind, || jobs.run(kind)).await
    }
}
