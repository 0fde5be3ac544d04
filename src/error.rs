//! 错误类型
//!
//! 只有 `ConfigError`、`LoadError`（循环开始前）和 `DuplicateJobError`（不变量被破坏）
//! 会向上传播并终止运行；提交失败和轮询失败都在本地消化。

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 编排器错误（致命）
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 种子加载错误
    #[error("加载错误: {0}")]
    Load(#[from] LoadError),
    /// 作业名冲突
    #[error("不变量被破坏: {0}")]
    DuplicateJob(#[from] DuplicateJobError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 批次大小非法
    #[error("批次大小必须为正整数, 实际为 {0}")]
    InvalidBatchSize(i64),
    /// 其他非法取值
    #[error("配置项 {key} 非法: {reason}")]
    InvalidValue { key: String, reason: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 种子（工作项）加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    /// 未配置任何种子来源
    #[error("未配置种子来源 (SEED_URLS 或 SEED_FILE)")]
    NoSource,
    /// 种子文件不存在
    #[error("种子文件不存在: {path}")]
    NotFound { path: String },
    /// 读取种子文件失败
    #[error("读取种子文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 作业提交错误（可恢复：批次记为失败，循环继续）
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 网络层失败
    #[error("提交作业 {job_name} 请求失败: {source}")]
    Transport {
        job_name: String,
        #[source]
        source: BoxError,
    },
    /// 后端拒绝创建
    #[error("后端拒绝创建作业 {job_name} (status={status}): {message}")]
    Rejected {
        job_name: String,
        status: u16,
        message: String,
    },
}

/// 轮询作业状态错误（可恢复：本次 tick 不做任何状态变更）
#[derive(Debug, Error)]
pub enum QueryError {
    /// 网络层失败
    #[error("查询作业状态请求失败: {source}")]
    Transport {
        #[source]
        source: BoxError,
    },
    /// 后端返回错误响应
    #[error("查询作业状态返回错误响应 (status={status}): {message}")]
    BadResponse { status: u16, message: String },
    /// 响应解析失败
    #[error("作业列表解析失败: {source}")]
    Decode {
        #[source]
        source: BoxError,
    },
}

/// 作业名重复（唯一性保证被破坏）
#[derive(Debug, Error)]
#[error("作业名重复: {job_name}")]
pub struct DuplicateJobError {
    pub job_name: String,
}

/// 分发错误：提交失败可恢复，名字冲突致命
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateJobError),
}

// ========== 便捷构造函数 ==========

impl SubmissionError {
    /// 创建网络层提交错误
    pub fn transport(
        job_name: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SubmissionError::Transport {
            job_name: job_name.into(),
            source: Box::new(source),
        }
    }

    /// 相关作业名
    pub fn job_name(&self) -> &str {
        match self {
            SubmissionError::Transport { job_name, .. }
            | SubmissionError::Rejected { job_name, .. } => job_name,
        }
    }
}

impl QueryError {
    /// 创建网络层查询错误
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        QueryError::Transport {
            source: Box::new(source),
        }
    }

    /// 创建解析错误
    pub fn decode(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        QueryError::Decode {
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 编排器结果类型
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_job_name() {
        let err = SubmissionError::Rejected {
            job_name: "scraper-batch-3-1".to_string(),
            status: 403,
            message: "forbidden".to_string(),
        };
        assert_eq!(err.job_name(), "scraper-batch-3-1");
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_fatal_errors_convert_into_orchestrator_error() {
        let err: OrchestratorError = ConfigError::InvalidBatchSize(0).into();
        assert!(matches!(err, OrchestratorError::Config(_)));

        let err: OrchestratorError = DuplicateJobError {
            job_name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, OrchestratorError::DuplicateJob(_)));
    }
}
