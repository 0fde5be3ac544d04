//! 作业分发器
//!
//! 把批次转换成作业规格并提交给后端。提交是"发完即走"的：
//! 成功后立即在跟踪器中登记为 Running，完成情况只由 Reconciler 观察。

use crate::config::Config;
use crate::error::DispatchError;
use crate::infrastructure::JobRunner;
use crate::models::{Batch, JobSpec, ResourceLimits};
use crate::orchestrator::job_tracker::JobTracker;
use crate::utils::logging::truncate_text;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 作业分发器
pub struct JobDispatcher {
    runner: Arc<dyn JobRunner>,
    job_name_prefix: String,
    parser: String,
    concurrency_hint: u32,
    resources: ResourceLimits,
    deadline_secs: u64,
    dry_run: bool,
}

impl JobDispatcher {
    pub fn new(runner: Arc<dyn JobRunner>, config: &Config) -> Self {
        Self {
            runner,
            job_name_prefix: config.job_name_prefix.clone(),
            parser: config.parser.clone(),
            concurrency_hint: config.per_job_concurrency,
            resources: config.resources.clone(),
            deadline_secs: config.job_timeout_secs,
            dry_run: config.dry_run,
        }
    }

    /// 生成作业名：前缀 + 批次号 + 毫秒时间戳
    pub fn job_name_for(&self, batch_id: u64, now: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}",
            self.job_name_prefix,
            batch_id,
            now.timestamp_millis()
        )
    }

    /// 构建作业规格
    pub fn build_spec(&self, batch: &Batch, job_name: String) -> JobSpec {
        JobSpec {
            job_name,
            batch_id: batch.batch_id,
            items: batch.items.to_vec(),
            parser: self.parser.clone(),
            concurrency_hint: self.concurrency_hint,
            resources: self.resources.clone(),
            deadline_secs: self.deadline_secs,
            dry_run: self.dry_run,
        }
    }

    /// 提交批次
    ///
    /// 成功返回后端确认的作业名，并已在跟踪器中登记；
    /// 后端拒绝时不登记任何作业，由调用方把批次记为失败。
    pub async fn submit(
        &self,
        batch: &Batch,
        tracker: &mut JobTracker,
    ) -> Result<String, DispatchError> {
        let now = Utc::now();
        let spec = self.build_spec(batch, self.job_name_for(batch.batch_id, now));

        debug!(
            "[批次 {}] 作业规格: {} | URL: {}",
            batch.batch_id,
            spec.job_name,
            truncate_text(&spec.items.join(","), 120)
        );

        let job_name = match self.runner.create_job(&spec).await {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    "[批次 {}] ⚠️ 创建作业 {} 失败: {}",
                    batch.batch_id,
                    e.job_name(),
                    e
                );
                return Err(e.into());
            }
        };

        tracker.register(&job_name, batch.clone(), now)?;

        info!(
            job_name = %job_name,
            batch_id = batch.batch_id,
            url_count = batch.len(),
            "📦 已创建批次作业"
        );

        Ok(job_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, SubmissionError};
    use crate::infrastructure::JobObservation;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录提交的规格，可按批次号拒绝
    #[derive(Default)]
    struct RecordingRunner {
        specs: Mutex<Vec<JobSpec>>,
        reject_batch: Option<u64>,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn create_job(&self, spec: &JobSpec) -> Result<String, SubmissionError> {
            if self.reject_batch == Some(spec.batch_id) {
                return Err(SubmissionError::Rejected {
                    job_name: spec.job_name.clone(),
                    status: 422,
                    message: "invalid".to_string(),
                });
            }
            self.specs.lock().unwrap().push(spec.clone());
            Ok(spec.job_name.clone())
        }

        async fn list_jobs(&self, _selector: &str) -> Result<Vec<JobObservation>, QueryError> {
            Ok(Vec::new())
        }
    }

    fn batch(id: u64) -> Batch {
        Batch::new(
            id,
            vec!["https://a.com/1".to_string(), "https://a.com/2".to_string()],
        )
    }

    #[tokio::test]
    async fn test_submit_registers_running_job() {
        let runner = Arc::new(RecordingRunner::default());
        let config = Config {
            parser: "weibo".to_string(),
            per_job_concurrency: 3,
            job_timeout_secs: 120,
            ..Config::default()
        };
        let dispatcher = JobDispatcher::new(runner.clone(), &config);
        let mut tracker = JobTracker::new();

        let job_name = dispatcher.submit(&batch(7), &mut tracker).await.unwrap();

        assert!(job_name.starts_with("scraper-batch-7-"));
        assert!(tracker.get(&job_name).is_some());

        let specs = runner.specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].parser, "weibo");
        assert_eq!(specs[0].concurrency_hint, 3);
        assert_eq!(specs[0].deadline_secs, 120);
        assert_eq!(specs[0].items.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_submission_registers_nothing() {
        let runner = Arc::new(RecordingRunner {
            reject_batch: Some(3),
            ..Default::default()
        });
        let dispatcher = JobDispatcher::new(runner, &Config::default());
        let mut tracker = JobTracker::new();

        let result = dispatcher.submit(&batch(3), &mut tracker).await;

        assert!(matches!(result, Err(DispatchError::Submission(_))));
        assert!(!tracker.has_active());
        assert!(tracker.failed().is_empty());
    }

    #[test]
    fn test_job_name_is_unique_per_batch() {
        let dispatcher = JobDispatcher::new(Arc::new(RecordingRunner::default()), &Config::default());
        let now = Utc::now();
        assert_ne!(dispatcher.job_name_for(1, now), dispatcher.job_name_for(2, now));
    }
}
