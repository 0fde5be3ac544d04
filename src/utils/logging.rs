//! 日志工具模块
//!
//! 提供启动、状态快照和最终汇总的日志输出
use crate::config::Config;
use crate::orchestrator::{RunSummary, StatusSnapshot};
use tracing::{info, warn};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 批量编排器启动");
    info!(
        batch_size = config.batch_size,
        max_concurrent_jobs = config.max_concurrent_jobs,
        job_timeout_secs = config.job_timeout_secs,
        poll_interval_ms = config.poll_interval_ms,
        namespace = %config.namespace,
        parser = %config.parser,
        "📊 配置"
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次切分结果
///
/// # 参数
/// - `total_urls`: URL 总数
/// - `batch_count`: 批次数
/// - `batch_size`: 每批大小
pub fn log_batches_loaded(total_urls: usize, batch_count: usize, batch_size: usize) {
    info!(
        total_urls,
        batch_count, batch_size, "✓ 找到 {} 个 URL，切分为 {} 个批次", total_urls, batch_count
    );
}

/// 输出状态快照
pub fn log_status(snapshot: &StatusSnapshot) {
    let active_jobs = serde_json::to_string(&snapshot.active_jobs).unwrap_or_default();
    info!(
        is_running = snapshot.is_running,
        queued_batches = snapshot.queued_batches,
        running_jobs = snapshot.running_jobs,
        completed_batches = snapshot.completed_batches,
        failed_batches = snapshot.failed_batches,
        total_processed = snapshot.total_processed,
        active_jobs = %active_jobs,
        "编排状态"
    );
}

/// 打印最终汇总
pub fn print_final_summary(summary: &RunSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        event = "orchestration_summary",
        total_batches = summary.total_batches,
        completed_batches = summary.completed_batches,
        failed_batches = summary.failed_batches,
        total_urls = summary.total_work_items,
        success_rate = summary.success_rate,
        cancelled = summary.cancelled,
        undispatched_batches = summary.undispatched_batches,
        abandoned_jobs = summary.abandoned_jobs,
        elapsed_ms = summary.elapsed_ms,
        "编排汇总"
    );
    info!(
        "✅ 成功: {}/{} 批次 ({} / {} URL, {:.2}%)",
        summary.completed_batches,
        summary.total_batches,
        summary.completed_work_items,
        summary.total_work_items,
        summary.success_rate
    );
    info!("❌ 失败: {} 批次", summary.failed_batches);
    for failure in &summary.failures {
        warn!(
            "  [批次 {}] 作业: {} | URL: {} | 原因: {}",
            failure.batch_id,
            failure.job_name.as_deref().unwrap_or("<未创建>"),
            failure.url_count,
            failure.reason
        );
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("https://a.com", 50), "https://a.com");
        assert_eq!(truncate_text("https://a.com/long", 8), "https://...");
    }
}
