//! # Scrape Orchestrator
//!
//! 把大量 URL 切成固定大小的批次，以外部作业（Kubernetes Job）的形式并发执行，
//! 并通过轮询协调作业状态，直到所有批次都进入终态。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 作业后端能力抽象
//! - `JobRunner` - 只暴露 create_job / list_jobs 两种能力
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 具体后端实现
//! - `KubeJobRunner` - Kubernetes batch/v1 REST 客户端
//!
//! ### ③ 模型层（Models）
//! - `models/` - `Batch`、`Job`、`JobSpec`，以及种子加载
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_queue` - 批次切分
//! - `orchestrator/dispatcher` - 作业提交
//! - `orchestrator/job_tracker` - 作业状态机
//! - `orchestrator/reconciler` - 状态协调
//! - `orchestrator/batch_processor` - 主循环与汇总
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod utils;

// 重新导出常用类型
pub use app::App;
pub use clients::KubeJobRunner;
pub use config::Config;
pub use error::{
    ConfigError, DispatchError, DuplicateJobError, LoadError, OrchestratorError,
    OrchestratorResult, QueryError, SubmissionError,
};
pub use infrastructure::{JobObservation, JobRunner};
pub use models::{Batch, FailedBatch, Job, JobSpec, JobStatus, WorkItem};
pub use orchestrator::{
    BatchOrchestrator, BatchQueue, JobDispatcher, JobTracker, ReconcileReport, Reconciler,
    RunOutcome, RunSummary, StatusSnapshot,
};
