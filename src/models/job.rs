//! 作业记录与生命周期状态

use crate::models::batch::Batch;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 作业状态
///
/// 只存在 `Running → Completed` 与 `Running → Failed` 两种转换，终态不可再变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// 一个批次的一次外部执行
#[derive(Debug, Clone)]
pub struct Job {
    /// 唯一作业名（后端只通过它反向引用）
    pub job_name: String,
    pub batch: Batch,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    /// 仅在进入终态时设置
    pub end_time: Option<DateTime<Utc>>,
    /// 仅在 Failed 时设置
    pub failure_reason: Option<String>,
}

impl Job {
    /// 创建一个刚提交成功的作业
    pub fn running(job_name: impl Into<String>, batch: Batch, start_time: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.into(),
            batch,
            status: JobStatus::Running,
            start_time,
            end_time: None,
            failure_reason: None,
        }
    }

    pub fn batch_id(&self) -> u64 {
        self.batch.batch_id
    }

    /// 已运行时长（毫秒）
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).num_milliseconds().max(0)
    }
}

/// 失败日志条目
#[derive(Debug, Clone)]
pub enum FailedBatch {
    /// 作业已创建，但后端报告失败
    Job(Job),
    /// 提交即被拒绝，从未进入活跃表，因此没有作业名
    Rejected {
        batch: Batch,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl FailedBatch {
    pub fn batch(&self) -> &Batch {
        match self {
            FailedBatch::Job(job) => &job.batch,
            FailedBatch::Rejected { batch, .. } => batch,
        }
    }

    pub fn job_name(&self) -> Option<&str> {
        match self {
            FailedBatch::Job(job) => Some(&job.job_name),
            FailedBatch::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            FailedBatch::Job(job) => job.failure_reason.as_deref().unwrap_or("Unknown"),
            FailedBatch::Rejected { reason, .. } => reason,
        }
    }
}
