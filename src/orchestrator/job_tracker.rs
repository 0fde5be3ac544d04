//! 作业跟踪器
//!
//! ## 职责
//!
//! 持有本次运行中所有作业的权威状态：活跃表（`job_name → Job`）、完成日志、失败日志。
//! 状态机只有两条边：`Running → Completed`、`Running → Failed`。
//!
//! 标记操作是幂等的：轮询可能多次观察到同一个终态，重复标记只记录警告。

use crate::error::DuplicateJobError;
use crate::models::{Batch, FailedBatch, Job, JobStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

/// 活跃作业的运行情况
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJobStatus {
    pub job_name: String,
    pub batch_id: u64,
    pub url_count: usize,
    pub runtime_ms: i64,
}

/// 状态快照（只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub queued_batches: usize,
    pub running_jobs: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub total_processed: usize,
    pub active_jobs: Vec<ActiveJobStatus>,
}

/// 作业跟踪器
#[derive(Debug, Default)]
pub struct JobTracker {
    active: HashMap<String, Job>,
    completed: Vec<Job>,
    failed: Vec<FailedBatch>,
    /// 所有登记过的作业名（含已终结），用于检测名字冲突
    known_names: HashSet<String>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个刚提交成功的作业（状态为 Running）
    pub fn register(
        &mut self,
        job_name: &str,
        batch: Batch,
        start_time: DateTime<Utc>,
    ) -> Result<(), DuplicateJobError> {
        if !self.known_names.insert(job_name.to_string()) {
            error!("[作业 {}] ❌ 作业名重复，唯一性保证被破坏", job_name);
            return Err(DuplicateJobError {
                job_name: job_name.to_string(),
            });
        }

        self.active
            .insert(job_name.to_string(), Job::running(job_name, batch, start_time));
        Ok(())
    }

    /// 标记作业完成
    ///
    /// 返回是否真正发生了状态转换；未知或已终结的作业名为空操作。
    pub fn mark_completed(&mut self, job_name: &str, end_time: DateTime<Utc>) -> bool {
        let Some(mut job) = self.take_running(job_name, JobStatus::Completed) else {
            return false;
        };

        job.status = JobStatus::Completed;
        job.end_time = Some(end_time);

        info!(
            job_name = %job.job_name,
            batch_id = job.batch_id(),
            duration_ms = job.elapsed_ms(end_time),
            url_count = job.batch.len(),
            "✓ 批次作业完成"
        );

        self.completed.push(job);
        true
    }

    /// 标记作业失败
    ///
    /// 返回是否真正发生了状态转换；未知或已终结的作业名为空操作。
    pub fn mark_failed(
        &mut self,
        job_name: &str,
        end_time: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> bool {
        let Some(mut job) = self.take_running(job_name, JobStatus::Failed) else {
            return false;
        };

        let reason = reason.into();
        job.status = JobStatus::Failed;
        job.end_time = Some(end_time);
        job.failure_reason = Some(reason.clone());

        error!(
            job_name = %job.job_name,
            batch_id = job.batch_id(),
            reason = %reason,
            url_count = job.batch.len(),
            "❌ 批次作业失败"
        );

        self.failed.push(FailedBatch::Job(job));
        true
    }

    /// 记录提交即失败的批次（没有作业名，不进入活跃表）
    pub fn record_rejected(&mut self, batch: Batch, reason: impl Into<String>, at: DateTime<Utc>) {
        let reason = reason.into();
        error!(
            batch_id = batch.batch_id,
            reason = %reason,
            url_count = batch.len(),
            "❌ 批次提交失败"
        );
        self.failed.push(FailedBatch::Rejected { batch, reason, at });
    }

    fn take_running(&mut self, job_name: &str, target: JobStatus) -> Option<Job> {
        match self.active.remove(job_name) {
            Some(job) => {
                debug_assert!(!job.status.is_terminal());
                Some(job)
            }
            None if self.known_names.contains(job_name) => {
                warn!(
                    "[作业 {}] 已处于终态，忽略重复的 {:?} 标记",
                    job_name, target
                );
                None
            }
            None => {
                warn!("[作业 {}] 未被跟踪，忽略 {:?} 标记", job_name, target);
                None
            }
        }
    }

    /// 当前活跃作业名
    pub fn active_job_names(&self) -> HashSet<String> {
        self.active.keys().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn get(&self, job_name: &str) -> Option<&Job> {
        self.active.get(job_name)
    }

    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.active.values()
    }

    pub fn completed(&self) -> &[Job] {
        &self.completed
    }

    pub fn failed(&self) -> &[FailedBatch] {
        &self.failed
    }

    /// 生成状态快照，不修改任何状态
    pub fn snapshot(&self, queued_batches: usize, is_running: bool) -> StatusSnapshot {
        let now = Utc::now();
        let mut active_jobs: Vec<ActiveJobStatus> = self
            .active_jobs()
            .map(|job| ActiveJobStatus {
                job_name: job.job_name.clone(),
                batch_id: job.batch_id(),
                url_count: job.batch.len(),
                runtime_ms: job.elapsed_ms(now),
            })
            .collect();
        active_jobs.sort_by_key(|j| j.batch_id);

        StatusSnapshot {
            is_running,
            queued_batches,
            running_jobs: self.active.len(),
            completed_batches: self.completed.len(),
            failed_batches: self.failed.len(),
            total_processed: self.completed.len() + self.failed.len(),
            active_jobs,
        }
    }
}
