//! 与具体后端无关的作业规格

use crate::models::batch::WorkItem;
use serde::{Deserialize, Serialize};

/// 单个作业的资源请求与限制
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub request_cpu: String,
    pub request_memory: String,
    pub limit_cpu: String,
    pub limit_memory: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            request_cpu: "100m".to_string(),
            request_memory: "256Mi".to_string(),
            limit_cpu: "500m".to_string(),
            limit_memory: "512Mi".to_string(),
        }
    }
}

/// 提交给 JobRunner 的作业规格
#[derive(Debug, Clone, Serialize)]
pub struct JobSpec {
    pub job_name: String,
    pub batch_id: u64,
    pub items: Vec<WorkItem>,
    /// 解析器 profile
    pub parser: String,
    /// 作业内部的并发提示，与全局上限无关
    pub concurrency_hint: u32,
    pub resources: ResourceLimits,
    /// 超过该秒数后由后端强制终止
    pub deadline_secs: u64,
    pub dry_run: bool,
}
