use crate::clients::KubeJobRunner;
use crate::config::Config;
use crate::infrastructure::JobRunner;
use crate::models::{load_work_items, SeedSource};
use crate::orchestrator::{BatchOrchestrator, RunOutcome};
use crate::utils::logging;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 应用主结构
pub struct App {
    config: Config,
    runner: Arc<dyn JobRunner>,
}

impl App {
    /// 初始化应用（连接 Kubernetes API）
    pub fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let runner = KubeJobRunner::from_config(&config)?;

        Ok(Self::with_runner(config, Arc::new(runner)))
    }

    /// 使用指定的作业后端
    pub fn with_runner(config: Config, runner: Arc<dyn JobRunner>) -> Self {
        Self { config, runner }
    }

    /// 运行应用主逻辑
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunOutcome> {
        // 加载所有待处理的 URL
        info!("\n📁 正在加载种子...");
        let source = SeedSource::from_config(&self.config)?;
        let items = load_work_items(&source).await?;

        // 每次运行新建编排器，状态互不干扰
        let orchestrator = BatchOrchestrator::new(self.runner.clone(), &self.config);
        let outcome = orchestrator.run(items, cancel).await?;

        Ok(outcome)
    }
}
