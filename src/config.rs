use crate::error::ConfigError;
use crate::models::ResourceLimits;
use serde::Deserialize;
use std::str::FromStr;

/// 程序配置
///
/// 加载顺序：默认值 → `ORCHESTRATOR_CONFIG` 指向的 TOML 文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每个批次包含的 URL 数量
    pub batch_size: usize,
    /// 同时运行的作业上限
    pub max_concurrent_jobs: usize,
    /// 单个作业的截止时间（秒），超时由后端强制终止
    pub job_timeout_secs: u64,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 两次提交之间的间隔（毫秒），避免压垮后端 API
    pub admission_delay_ms: u64,
    /// 作业所在命名空间
    pub namespace: String,
    /// 查询本编排器管理作业的标签选择器
    pub label_selector: String,
    /// 解析器 profile
    pub parser: String,
    /// 种子文件路径
    pub seed_file: String,
    /// 直接传入的 URL 列表（优先于种子文件）
    pub seed_urls: Vec<String>,
    /// 单个作业内部的并发提示
    pub per_job_concurrency: u32,
    /// 作业名前缀
    pub job_name_prefix: String,
    /// 抓取镜像
    pub scraper_image: String,
    /// 透传给抓取进程的 DRY_RUN
    pub dry_run: bool,
    /// 作业结束后保留时间（秒）
    pub ttl_seconds_after_finished: u32,
    /// 作业内部重启次数上限
    pub backoff_limit: u32,
    /// 资源请求与限制
    pub resources: ResourceLimits,
    // --- Kubernetes API 配置 ---
    pub kube_api_url: String,
    pub kube_token_file: String,
    pub kube_ca_file: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_concurrent_jobs: 20,
            job_timeout_secs: 600,
            poll_interval_ms: 10_000,
            admission_delay_ms: 100,
            namespace: "web-scraper".to_string(),
            label_selector: "orchestrator-managed=true".to_string(),
            parser: "generic-news".to_string(),
            seed_file: "seeds-generic-news.txt".to_string(),
            seed_urls: Vec::new(),
            per_job_concurrency: 2,
            job_name_prefix: "scraper-batch".to_string(),
            scraper_image: "web-scraper:latest".to_string(),
            dry_run: false,
            ttl_seconds_after_finished: 300,
            backoff_limit: 2,
            resources: ResourceLimits::default(),
            kube_api_url: "https://kubernetes.default.svc".to_string(),
            kube_token_file: "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string(),
            kube_ca_file: "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// 按 默认值 → TOML 文件 → 环境变量 的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("ORCHESTRATOR_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载，缺省字段取默认值
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖当前配置
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        override_parsed("BATCH_SIZE", "正整数", &mut self.batch_size)?;
        override_parsed("MAX_CONCURRENT_JOBS", "正整数", &mut self.max_concurrent_jobs)?;
        override_parsed("JOB_TIMEOUT", "秒数", &mut self.job_timeout_secs)?;
        override_parsed("POLL_INTERVAL", "毫秒数", &mut self.poll_interval_ms)?;
        override_parsed("ADMISSION_DELAY", "毫秒数", &mut self.admission_delay_ms)?;
        override_string("NAMESPACE", &mut self.namespace);
        override_string("LABEL_SELECTOR", &mut self.label_selector);
        override_string("PARSER", &mut self.parser);
        override_string("SEED_FILE", &mut self.seed_file);
        if let Ok(urls) = std::env::var("SEED_URLS") {
            self.seed_urls = split_url_list(&urls);
        }
        override_parsed("PER_JOB_CONCURRENCY", "正整数", &mut self.per_job_concurrency)?;
        override_string("JOB_NAME_PREFIX", &mut self.job_name_prefix);
        override_string("SCRAPER_IMAGE", &mut self.scraper_image);
        override_parsed("DRY_RUN", "布尔值", &mut self.dry_run)?;
        override_parsed("JOB_TTL_SECONDS", "秒数", &mut self.ttl_seconds_after_finished)?;
        override_parsed("JOB_BACKOFF_LIMIT", "整数", &mut self.backoff_limit)?;
        override_string("JOB_CPU_REQUEST", &mut self.resources.request_cpu);
        override_string("JOB_MEMORY_REQUEST", &mut self.resources.request_memory);
        override_string("JOB_CPU_LIMIT", &mut self.resources.limit_cpu);
        override_string("JOB_MEMORY_LIMIT", &mut self.resources.limit_memory);
        override_string("KUBE_API_URL", &mut self.kube_api_url);
        override_string("KUBE_TOKEN_FILE", &mut self.kube_token_file);
        override_string("KUBE_CA_FILE", &mut self.kube_ca_file);
        override_parsed("KUBE_REQUEST_TIMEOUT", "秒数", &mut self.request_timeout_secs)?;
        Ok(self)
    }

    /// 校验静态配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(0));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(invalid("max_concurrent_jobs", "必须大于 0"));
        }
        if self.job_timeout_secs == 0 {
            return Err(invalid("job_timeout_secs", "必须大于 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "必须大于 0"));
        }
        if self.per_job_concurrency == 0 {
            return Err(invalid("per_job_concurrency", "必须大于 0"));
        }
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "不能为空"));
        }
        // 选择器同时用作作业标签，只能是 key=value 的组合
        if !is_equality_selector(&self.label_selector) {
            return Err(invalid(
                "label_selector",
                "只支持 key=value[,key=value] 形式的等值选择器",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn is_equality_selector(selector: &str) -> bool {
    let is_key_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/');
    let is_value_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');

    !selector.trim().is_empty()
        && selector.split(',').all(|pair| match pair.trim().split_once('=') {
            Some((key, value)) => {
                !key.is_empty() && key.chars().all(is_key_char) && value.chars().all(is_value_char)
            }
            None => false,
        })
}

fn override_string(var_name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var_name) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(
    var_name: &str,
    expected_type: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(var_name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: value.clone(),
                expected_type: expected_type.to_string(),
            })?;
    }
    Ok(())
}

/// 拆分逗号分隔的 URL 列表
pub fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_concurrent_jobs, 20);
        assert_eq!(config.job_timeout_secs, 600);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.namespace, "web-scraper");
        assert_eq!(config.parser, "generic-news");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_only_given_fields() {
        let config = Config::from_toml_str(
            r#"
            batch_size = 10
            namespace = "crawl"

            [resources]
            limit_memory = "1Gi"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.namespace, "crawl");
        assert_eq!(config.resources.limit_memory, "1Gi");
        assert_eq!(config.resources.limit_cpu, "500m");
        assert_eq!(config.max_concurrent_jobs, 20);
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_jobs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_label_selector() {
        for selector in ["orchestrator-managed=true", "app=scraper, team=crawl", "tier="] {
            let config = Config {
                label_selector: selector.to_string(),
                ..Config::default()
            };
            assert!(config.validate().is_ok(), "{} 应当合法", selector);
        }

        for selector in ["", "env in (a,b)", "!foo", "app!=scraper", "app==scraper", "app"] {
            let config = Config {
                label_selector: selector.to_string(),
                ..Config::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue { ref key, .. }) if key == "label_selector"),
                "{} 应当被拒绝",
                selector
            );
        }
    }

    #[test]
    fn test_split_url_list() {
        let urls = split_url_list(" https://a.com/1, ,https://b.com/2 ,");
        assert_eq!(urls, vec!["https://a.com/1", "https://b.com/2"]);
    }
}
