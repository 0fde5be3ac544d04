//! 状态协调器
//!
//! 每个轮询 tick 调用一次：按标签选择器向后端查询作业状态，推进跟踪器中的状态机。
//!
//! - 后端返回的、但不在本地活跃表中的作业一律忽略（其他运行或残留作业）
//! - 本地在跟踪、但后端响应中缺失的作业保持 Running（视为"尚不可见"，而非失败）
//! - 查询失败只记录日志，本次 tick 不做任何状态变更

use crate::infrastructure::{JobObservation, JobRunner};
use crate::orchestrator::job_tracker::JobTracker;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// 单次协调结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: usize,
    pub failed: usize,
    /// 后端可见但尚未终结
    pub still_running: usize,
    /// 后端响应中缺失
    pub not_visible: usize,
    /// 不属于本次运行的作业
    pub ignored: usize,
    /// 查询是否失败
    pub query_failed: bool,
}

/// 状态协调器
pub struct Reconciler {
    runner: Arc<dyn JobRunner>,
    selector: String,
}

impl Reconciler {
    pub fn new(runner: Arc<dyn JobRunner>, selector: impl Into<String>) -> Self {
        Self {
            runner,
            selector: selector.into(),
        }
    }

    /// 执行一次协调
    pub async fn reconcile(&self, tracker: &mut JobTracker) -> ReconcileReport {
        let active = tracker.active_job_names();
        let mut report = ReconcileReport::default();

        if active.is_empty() {
            return report;
        }

        let observations = match self.runner.list_jobs(&self.selector).await {
            Ok(observations) => observations,
            Err(e) => {
                error!(
                    selector = %self.selector,
                    active_jobs = active.len(),
                    "❌ 查询作业状态失败，本轮跳过: {}",
                    e
                );
                report.query_failed = true;
                return report;
            }
        };

        let mut seen: HashSet<&str> = HashSet::new();

        for observation in &observations {
            if !active.contains(&observation.name) {
                report.ignored += 1;
                continue;
            }
            seen.insert(observation.name.as_str());
            apply_observation(tracker, observation, &mut report);
        }

        report.not_visible = active.iter().filter(|name| !seen.contains(name.as_str())).count();

        debug!(
            "协调完成: 完成 {} | 失败 {} | 运行中 {} | 不可见 {} | 忽略 {}",
            report.completed, report.failed, report.still_running, report.not_visible, report.ignored
        );

        report
    }
}

fn apply_observation(
    tracker: &mut JobTracker,
    observation: &JobObservation,
    report: &mut ReconcileReport,
) {
    let now = Utc::now();

    if observation.complete {
        if tracker.mark_completed(&observation.name, now) {
            report.completed += 1;
        }
    } else if observation.failed {
        if tracker.mark_failed(&observation.name, now, failure_reason(observation)) {
            report.failed += 1;
        }
    } else {
        report.still_running += 1;
    }
}

/// 组合后端给出的失败原因与消息
fn failure_reason(observation: &JobObservation) -> String {
    let reason = observation.reason.as_deref().unwrap_or("Unknown");
    match observation.message.as_deref() {
        Some(message) if !message.is_empty() => format!("{}: {}", reason, message),
        _ => reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, SubmissionError};
    use crate::models::{Batch, JobSpec, JobStatus};
    use async_trait::async_trait;

    /// 返回固定观察结果的后端
    struct FixedRunner {
        response: Result<Vec<JobObservation>, u16>,
    }

    #[async_trait]
    impl JobRunner for FixedRunner {
        async fn create_job(&self, spec: &JobSpec) -> Result<String, SubmissionError> {
            Ok(spec.job_name.clone())
        }

        async fn list_jobs(&self, _selector: &str) -> Result<Vec<JobObservation>, QueryError> {
            match &self.response {
                Ok(observations) => Ok(observations.clone()),
                Err(status) => Err(QueryError::BadResponse {
                    status: *status,
                    message: "unavailable".to_string(),
                }),
            }
        }
    }

    fn reconciler(response: Result<Vec<JobObservation>, u16>) -> Reconciler {
        Reconciler::new(Arc::new(FixedRunner { response }), "orchestrator-managed=true")
    }

    fn tracker_with(names: &[&str]) -> JobTracker {
        let mut tracker = JobTracker::new();
        for (i, name) in names.iter().enumerate() {
            let batch = Batch::new(i as u64 + 1, vec![format!("https://a.com/{}", i)]);
            tracker.register(name, batch, Utc::now()).unwrap();
        }
        tracker
    }

    #[tokio::test]
    async fn test_complete_and_failed_conditions_advance_state() {
        let mut tracker = tracker_with(&["job-1", "job-2", "job-3"]);
        let reconciler = reconciler(Ok(vec![
            JobObservation::completed("job-1"),
            JobObservation {
                message: Some("Job has reached the specified backoff limit".to_string()),
                ..JobObservation::failed("job-2", "BackoffLimitExceeded")
            },
            JobObservation::pending("job-3"),
        ]));

        let report = reconciler.reconcile(&mut tracker).await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.still_running, 1);
        assert_eq!(tracker.completed()[0].job_name, "job-1");
        assert_eq!(
            tracker.failed()[0].reason(),
            "BackoffLimitExceeded: Job has reached the specified backoff limit"
        );
        assert_eq!(tracker.get("job-3").unwrap().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_absent_job_stays_running() {
        let mut tracker = tracker_with(&["job-1", "job-2"]);
        let reconciler = reconciler(Ok(vec![JobObservation::completed("job-1")]));

        let report = reconciler.reconcile(&mut tracker).await;

        assert_eq!(report.not_visible, 1);
        assert_eq!(tracker.get("job-2").unwrap().status, JobStatus::Running);
        assert!(tracker.failed().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_jobs_are_ignored() {
        let mut tracker = tracker_with(&["job-1"]);
        let reconciler = reconciler(Ok(vec![
            JobObservation::failed("other-run-job", "DeadlineExceeded"),
            JobObservation::completed("stale-job"),
        ]));

        let report = reconciler.reconcile(&mut tracker).await;

        assert_eq!(report.ignored, 2);
        assert_eq!(tracker.active_count(), 1);
        assert!(tracker.completed().is_empty());
        assert!(tracker.failed().is_empty());
    }

    #[tokio::test]
    async fn test_query_error_is_noop_tick() {
        let mut tracker = tracker_with(&["job-1"]);
        let reconciler = reconciler(Err(503));

        let report = reconciler.reconcile(&mut tracker).await;

        assert!(report.query_failed);
        assert_eq!(tracker.active_count(), 1);
    }

    #[tokio::test]
    async fn test_repeated_terminal_observation_is_idempotent() {
        let mut tracker = tracker_with(&["job-1"]);
        let reconciler = reconciler(Ok(vec![
            JobObservation::completed("job-1"),
            JobObservation::completed("job-1"),
        ]));

        let report = reconciler.reconcile(&mut tracker).await;

        assert_eq!(report.completed, 1);
        assert_eq!(tracker.completed().len(), 1);
    }

    #[test]
    fn test_failure_reason_defaults_to_unknown() {
        let observation = JobObservation {
            name: "job-1".to_string(),
            failed: true,
            ..Default::default()
        };
        assert_eq!(failure_reason(&observation), "Unknown");
    }
}
