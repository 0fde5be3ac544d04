//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次切分、准入控制和状态协调，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_queue` - 批次队列
//! - 把工作项切成固定大小的有序批次，FIFO 出队
//!
//! ### `dispatcher` - 作业分发器
//! - 批次 → 作业规格 → 提交给后端，成功后登记到跟踪器
//!
//! ### `job_tracker` - 作业跟踪器
//! - 活跃表、完成日志、失败日志；作业状态机
//!
//! ### `reconciler` - 状态协调器
//! - 轮询后端，推进作业状态
//!
//! ### `batch_processor` - 主循环
//! - 准入 → 协调 → 快照 → 休眠，直到全部批次终结
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (驱动整个运行)
//!     ↓
//! batch_queue / dispatcher / reconciler
//!     ↓
//! job_tracker (唯一的状态持有者)
//!     ↓
//! infrastructure::JobRunner (外部作业后端)
//! ```

pub mod batch_processor;
pub mod batch_queue;
pub mod dispatcher;
pub mod job_tracker;
pub mod reconciler;

// 重新导出主要类型
pub use batch_processor::{
    BatchOrchestrator, FailureRecord, OrchestrationState, RunOutcome, RunSummary,
};
pub use batch_queue::BatchQueue;
pub use dispatcher::JobDispatcher;
pub use job_tracker::{ActiveJobStatus, JobTracker, StatusSnapshot};
pub use reconciler::{ReconcileReport, Reconciler};
