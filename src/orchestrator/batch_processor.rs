//! 批量编排主循环 - 编排层
//!
//! ## 职责
//!
//! 驱动整个运行：在并发上限内贪心地分发批次，每个 tick 协调一次作业状态并输出快照，
//! 直到待分发队列和活跃表都为空。
//!
//! ## 核心流程
//!
//! 1. **切分批次**：`BatchQueue::load`，失败则直接终止；零批次时跳过
//! 2. **准入控制**：活跃作业数小于 `max_concurrent_jobs` 时按 FIFO 提交，每次提交后短暂停顿
//! 3. **状态协调**：`Reconciler::reconcile`
//! 4. **状态快照**：每个 tick 输出一次
//! 5. **汇总**：运行结束输出总批次、成功率等
//!
//! ## 设计特点
//!
//! - **单线程协作**：所有状态由本循环以 `&mut` 独占修改，不需要锁
//! - **每次运行独立**：状态在 `run` 内部新建，同一进程可以跑多次互不干扰
//! - **可取消**：取消后不再准入新批次，完成当前 tick 的记账后退出；已提交的外部作业不做处理

use crate::config::Config;
use crate::error::{DispatchError, OrchestratorResult};
use crate::infrastructure::JobRunner;
use crate::models::{FailedBatch, WorkItem};
use crate::orchestrator::batch_queue::BatchQueue;
use crate::orchestrator::dispatcher::JobDispatcher;
use crate::orchestrator::job_tracker::{JobTracker, StatusSnapshot};
use crate::orchestrator::reconciler::Reconciler;
use crate::utils::logging;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 运行汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// 已到达终态的批次（完成 + 失败）
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub total_work_items: usize,
    pub completed_work_items: usize,
    pub failed_work_items: usize,
    /// completed_work_items / total_work_items * 100，保留两位小数
    pub success_rate: f64,
    /// 是否因取消而提前结束
    pub cancelled: bool,
    /// 取消时尚未分发的批次
    pub undispatched_batches: usize,
    /// 取消时仍在外部运行的作业
    pub abandoned_jobs: usize,
    pub elapsed_ms: u64,
    /// 失败批次明细（按失败先后）
    pub failures: Vec<FailureRecord>,
}

/// 失败批次明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub batch_id: u64,
    /// 提交即被拒绝时为空
    pub job_name: Option<String>,
    pub url_count: usize,
    pub reason: String,
}

impl From<&FailedBatch> for FailureRecord {
    fn from(failed: &FailedBatch) -> Self {
        Self {
            batch_id: failed.batch().batch_id,
            job_name: failed.job_name().map(String::from),
            url_count: failed.batch().len(),
            reason: failed.reason().to_string(),
        }
    }
}

impl RunSummary {
    fn from_state(state: &OrchestrationState, cancelled: bool, elapsed: Duration) -> Self {
        let completed_work_items: usize =
            state.tracker.completed().iter().map(|job| job.batch.len()).sum();
        let failed_work_items: usize =
            state.tracker.failed().iter().map(|f| f.batch().len()).sum();
        let total_work_items = completed_work_items + failed_work_items;

        Self {
            total_batches: state.tracker.completed().len() + state.tracker.failed().len(),
            completed_batches: state.tracker.completed().len(),
            failed_batches: state.tracker.failed().len(),
            total_work_items,
            completed_work_items,
            failed_work_items,
            success_rate: success_rate(completed_work_items, total_work_items),
            cancelled,
            undispatched_batches: state.queue.len(),
            abandoned_jobs: state.tracker.active_count(),
            elapsed_ms: elapsed.as_millis() as u64,
            failures: state.tracker.failed().iter().map(FailureRecord::from).collect(),
        }
    }
}

/// 成功率（百分比，两位小数）；总数为 0 时为 0
pub fn success_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = completed as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// 运行结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 没有任何工作项，未做任何分发
    NothingToProcess,
    Finished(RunSummary),
}

/// 单次运行的全部状态
#[derive(Debug)]
pub struct OrchestrationState {
    pub queue: BatchQueue,
    pub tracker: JobTracker,
    /// 仅用于对外报告
    pub running: bool,
}

impl OrchestrationState {
    pub fn new(queue: BatchQueue) -> Self {
        Self {
            queue,
            tracker: JobTracker::new(),
            running: false,
        }
    }

    /// 队列和活跃表是否都已清空
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && !self.tracker.has_active()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tracker.snapshot(self.queue.len(), self.running)
    }
}

/// 批量编排器
pub struct BatchOrchestrator {
    config: Config,
    dispatcher: JobDispatcher,
    reconciler: Reconciler,
    batch_size: usize,
    max_concurrent_jobs: usize,
    admission_delay: Duration,
    poll_interval: Duration,
}

impl BatchOrchestrator {
    pub fn new(runner: Arc<dyn JobRunner>, config: &Config) -> Self {
        Self {
            config: config.clone(),
            dispatcher: JobDispatcher::new(runner.clone(), config),
            reconciler: Reconciler::new(runner, config.label_selector.clone()),
            batch_size: config.batch_size,
            max_concurrent_jobs: config.max_concurrent_jobs,
            admission_delay: Duration::from_millis(config.admission_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// 运行一次完整的编排
    ///
    /// 只有静态配置非法和作业名冲突会返回错误；提交失败、查询失败都计入汇总。
    /// 配置在切分批次之前校验，非法时不会提交任何作业。
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        cancel: CancellationToken,
    ) -> OrchestratorResult<RunOutcome> {
        self.config.validate()?;

        let started = Instant::now();
        let total_items = items.len();
        let queue = BatchQueue::load(items, self.batch_size)?;

        if queue.is_empty() {
            warn!("⚠️ 没有待处理的 URL 批次，程序结束");
            return Ok(RunOutcome::NothingToProcess);
        }

        logging::log_batches_loaded(total_items, queue.total_batches(), self.batch_size);

        let mut state = OrchestrationState::new(queue);
        state.running = true;
        let mut cancelled = false;

        while !state.is_drained() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.admit(&mut state, &cancel).await?;

            self.reconciler.reconcile(&mut state.tracker).await;
            logging::log_status(&state.snapshot());

            if state.is_drained() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = sleep(self.poll_interval) => {}
            }
        }

        state.running = false;

        if cancelled {
            warn!(
                undispatched_batches = state.queue.len(),
                in_flight_jobs = state.tracker.active_count(),
                "🛑 收到取消信号，停止准入新批次"
            );
        }

        logging::log_status(&state.snapshot());
        let summary = RunSummary::from_state(&state, cancelled, started.elapsed());
        logging::print_final_summary(&summary);

        Ok(RunOutcome::Finished(summary))
    }

    /// 在并发上限内按 FIFO 顺序提交批次
    async fn admit(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        while state.tracker.active_count() < self.max_concurrent_jobs && !cancel.is_cancelled() {
            let Some(batch) = state.queue.pop_front() else {
                break;
            };

            match self.dispatcher.submit(&batch, &mut state.tracker).await {
                Ok(_) => {}
                Err(DispatchError::Submission(e)) => {
                    state.tracker.record_rejected(batch, e.to_string(), Utc::now());
                }
                Err(DispatchError::Duplicate(e)) => return Err(e.into()),
            }

            sleep(self.admission_delay).await;
        }

        info!(
            "准入完成: 运行中 {}/{} | 待分发 {}",
            state.tracker.active_count(),
            self.max_concurrent_jobs,
            state.queue.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_rounds_to_two_decimals() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(20, 25), 80.0);
        assert_eq!(success_rate(1, 3), 33.33);
        assert_eq!(success_rate(2, 3), 66.67);
        assert_eq!(success_rate(5, 5), 100.0);
    }

    #[test]
    fn test_fresh_state_is_not_running() {
        let queue = BatchQueue::load(vec!["https://a.com".to_string()], 5).unwrap();
        let state = OrchestrationState::new(queue);
        assert!(!state.running);
        assert!(!state.is_drained());
        assert_eq!(state.snapshot().queued_batches, 1);
    }
}
