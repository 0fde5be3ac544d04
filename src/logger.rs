//! 日志初始化
//!
//! 过滤级别优先取 `RUST_LOG`，其次 `LOG_LEVEL`，默认 `info`；`LOG_FORMAT=json` 时输出 JSON。

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    // 重复初始化（例如测试中）时忽略错误
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
