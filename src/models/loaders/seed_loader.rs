use crate::config::Config;
use crate::error::LoadError;
use crate::models::batch::WorkItem;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// 种子来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// 直接传入的 URL 列表
    Urls(Vec<WorkItem>),
    /// 种子文件
    File(PathBuf),
}

impl SeedSource {
    /// 从配置中解析种子来源，`seed_urls` 优先
    pub fn from_config(config: &Config) -> Result<Self, LoadError> {
        if !config.seed_urls.is_empty() {
            return Ok(SeedSource::Urls(config.seed_urls.clone()));
        }
        if config.seed_file.trim().is_empty() {
            return Err(LoadError::NoSource);
        }
        Ok(SeedSource::File(PathBuf::from(&config.seed_file)))
    }
}

/// JSON 对象形式的种子行，只关心 url
#[derive(Debug, Deserialize)]
struct SeedRecord {
    url: Option<String>,
}

/// 加载所有工作项，保持原始顺序
pub async fn load_work_items(source: &SeedSource) -> Result<Vec<WorkItem>, LoadError> {
    match source {
        SeedSource::Urls(urls) => {
            info!("使用直接传入的 {} 个 URL", urls.len());
            Ok(urls.clone())
        }
        SeedSource::File(path) => load_seed_file(path).await,
    }
}

/// 从种子文件加载工作项
pub async fn load_seed_file(path: &Path) -> Result<Vec<WorkItem>, LoadError> {
    let path_str = path.display().to_string();

    if !path.exists() {
        return Err(LoadError::NotFound { path: path_str });
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::ReadFailed {
            path: path_str.clone(),
            source,
        })?;

    let items = parse_seed_lines(&content);
    info!("正在加载种子文件: {} ({} 个 URL)", path_str, items.len());

    Ok(items)
}

/// 解析种子文件内容
///
/// 每行一个条目：空行和 `#` 开头的行跳过；`{...}` 行按 JSON（或宽松对象写法）取 `url`；
/// 其余行必须是 http(s) URL。
pub fn parse_seed_lines(content: &str) -> Vec<WorkItem> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() {
                warn!("跳过无法识别的种子行: {}", line);
            }
            parsed
        })
        .collect()
}

fn parse_line(line: &str) -> Option<WorkItem> {
    if line.starts_with('{') && line.ends_with('}') {
        return parse_object_line(line);
    }
    if is_http_url(line) {
        return Some(line.to_string());
    }
    None
}

fn parse_object_line(line: &str) -> Option<WorkItem> {
    let record = match serde_json::from_str::<SeedRecord>(line) {
        Ok(record) => record,
        Err(_) => {
            let normalized = normalize_object_notation(line)?;
            debug!("种子行按宽松写法解析: {}", normalized);
            serde_json::from_str::<SeedRecord>(&normalized).ok()?
        }
    };
    record.url.filter(|url| !url.is_empty())
}

/// `{url: 'https://..'}` → `{"url": "https://.."}`
fn normalize_object_notation(line: &str) -> Option<String> {
    let re = Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").ok()?;
    let quoted_keys = re.replace_all(line, r#"$1"$2":"#);
    Some(quoted_keys.replace('\'', "\""))
}

fn is_http_url(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
