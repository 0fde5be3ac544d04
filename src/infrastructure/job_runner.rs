//! 作业后端 - 基础设施层
//!
//! 只暴露"创建作业"和"按选择器列出作业"两种能力，不认识批次和调度。

use crate::error::{QueryError, SubmissionError};
use crate::models::JobSpec;
use async_trait::async_trait;

/// 后端观察到的作业状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobObservation {
    pub name: String,
    /// 是否出现 Complete 条件
    pub complete: bool,
    /// 是否出现 Failed 条件
    pub failed: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl JobObservation {
    /// 仍在运行（或状态尚未反映到后端）
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn completed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            complete: true,
            ..Default::default()
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: true,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// 作业后端
///
/// 职责：
/// - 在进程外执行作业
/// - 不持有任何对编排器状态的引用，只通过作业名关联
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// 创建作业，返回后端确认的作业名
    async fn create_job(&self, spec: &JobSpec) -> Result<String, SubmissionError>;

    /// 列出选择器范围内的所有作业（可能包含其他运行创建的作业）
    async fn list_jobs(&self, selector: &str) -> Result<Vec<JobObservation>, QueryError>;
}
