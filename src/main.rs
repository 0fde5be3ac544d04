use anyhow::Result;
use scrape_orchestrator::{logger, App, Config, RunOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env（不存在时忽略）
    dotenvy::dotenv().ok();

    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::load()?;

    // 收到终止信号后停止准入新批次
    let cancel = CancellationToken::new();
    tokio::spawn(watch_shutdown(cancel.clone()));

    // 初始化并运行应用
    let outcome = App::initialize(config)?.run(cancel).await.map_err(|e| {
        error!("编排失败: {:#}", e);
        e
    })?;

    if let RunOutcome::Finished(summary) = outcome {
        if summary.cancelled {
            info!("编排已中断，仍有 {} 个作业在外部运行", summary.abandoned_jobs);
        }
    }

    Ok(())
}

/// 等待 SIGINT / SIGTERM 并触发取消
async fn watch_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听 Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("收到 SIGINT，正在优雅退出..."),
        () = terminate => info!("收到 SIGTERM，正在优雅退出..."),
    }

    cancel.cancel();
}
