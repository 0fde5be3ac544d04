//! Kubernetes 作业 API 客户端
//!
//! 通过 batch/v1 REST 接口创建和列出作业，实现 `JobRunner`
use crate::config::Config;
use crate::error::{QueryError, SubmissionError};
use crate::infrastructure::{JobObservation, JobRunner};
use crate::models::JobSpec;
use crate::utils::logging::truncate_text;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 每页拉取的作业数量
const LIST_PAGE_SIZE: u32 = 500;

/// Kubernetes 作业客户端
pub struct KubeJobRunner {
    client: reqwest::Client,
    api_url: String,
    namespace: String,
    token: Option<String>,
    image: String,
    label_selector: String,
    ttl_seconds_after_finished: u32,
    backoff_limit: u32,
}

impl KubeJobRunner {
    /// 从配置创建客户端
    ///
    /// service account 的 token 和 CA 文件存在时才使用，
    /// 这样也可以直接指向 `kubectl proxy` 的地址。
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));

        if Path::new(&config.kube_ca_file).exists() {
            let pem = std::fs::read(&config.kube_ca_file)
                .with_context(|| format!("无法读取 CA 文件: {}", config.kube_ca_file))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("无法解析 CA 文件: {}", config.kube_ca_file))?;
            builder = builder.add_root_certificate(cert);
            debug!("已加载集群 CA: {}", config.kube_ca_file);
        }

        let token = if Path::new(&config.kube_token_file).exists() {
            let raw = std::fs::read_to_string(&config.kube_token_file)
                .with_context(|| format!("无法读取 token 文件: {}", config.kube_token_file))?;
            Some(raw.trim().to_string())
        } else {
            warn!("未找到 token 文件 {}，以匿名方式访问 API", config.kube_token_file);
            None
        };

        let client = builder.build().context("无法创建 HTTP 客户端")?;

        info!(
            "✓ Kubernetes 客户端就绪: {} (命名空间: {})",
            config.kube_api_url, config.namespace
        );

        Ok(Self {
            client,
            api_url: config.kube_api_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token,
            image: config.scraper_image.clone(),
            label_selector: config.label_selector.clone(),
            ttl_seconds_after_finished: config.ttl_seconds_after_finished,
            backoff_limit: config.backoff_limit,
        })
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/apis/batch/v1/namespaces/{}/jobs",
            self.api_url, self.namespace
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// 渲染作业清单
    pub fn render_manifest(&self, spec: &JobSpec) -> Value {
        let batch_id = spec.batch_id.to_string();

        let mut labels = selector_labels(&self.label_selector);
        labels.insert("app".to_string(), json!("web-scraper"));
        labels.insert("batch-id".to_string(), json!(batch_id));

        json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {
                "name": spec.job_name,
                "namespace": self.namespace,
                "labels": labels,
            },
            "spec": {
                "ttlSecondsAfterFinished": self.ttl_seconds_after_finished,
                "activeDeadlineSeconds": spec.deadline_secs,
                "backoffLimit": self.backoff_limit,
                "template": {
                    "metadata": {
                        "labels": {
                            "app": "web-scraper",
                            "batch-id": batch_id,
                        }
                    },
                    "spec": {
                        "restartPolicy": "Never",
                        "containers": [{
                            "name": "scraper",
                            "image": self.image,
                            "command": ["node", "src/index.js"],
                            "args": [
                                "--parser", spec.parser,
                                "--urls", spec.items.join(","),
                                "--max-concurrency", spec.concurrency_hint.to_string(),
                            ],
                            "env": [{
                                "name": "DRY_RUN",
                                "value": spec.dry_run.to_string(),
                            }],
                            "resources": {
                                "requests": {
                                    "memory": spec.resources.request_memory,
                                    "cpu": spec.resources.request_cpu,
                                },
                                "limits": {
                                    "memory": spec.resources.limit_memory,
                                    "cpu": spec.resources.limit_cpu,
                                }
                            },
                            "securityContext": {
                                "runAsNonRoot": true,
                                "runAsUser": 1001,
                                "readOnlyRootFilesystem": true,
                                "allowPrivilegeEscalation": false,
                            },
                            "volumeMounts": [{
                                "name": "temp",
                                "mountPath": "/tmp",
                            }]
                        }],
                        "volumes": [{
                            "name": "temp",
                            "emptyDir": {},
                        }]
                    }
                }
            }
        })
    }
}

#[async_trait]
impl JobRunner for KubeJobRunner {
    async fn create_job(&self, spec: &JobSpec) -> Result<String, SubmissionError> {
        let manifest = self.render_manifest(spec);

        let response = self
            .authorized(self.client.post(self.jobs_url()))
            .json(&manifest)
            .send()
            .await
            .map_err(|e| SubmissionError::transport(&spec.job_name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected {
                job_name: spec.job_name.clone(),
                status: status.as_u16(),
                message: status_message(&body),
            });
        }

        let created = response.json::<KubeJob>().await.ok();
        Ok(created
            .and_then(|job| job.metadata.name)
            .unwrap_or_else(|| spec.job_name.clone()))
    }

    async fn list_jobs(&self, selector: &str) -> Result<Vec<JobObservation>, QueryError> {
        let mut observations = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("labelSelector", selector.to_string()),
                ("limit", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &continue_token {
                query.push(("continue", token.clone()));
            }

            let response = self
                .authorized(self.client.get(self.jobs_url()))
                .query(&query)
                .send()
                .await
                .map_err(QueryError::transport)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(QueryError::BadResponse {
                    status: status.as_u16(),
                    message: status_message(&body),
                });
            }

            let page: KubeJobList = response.json().await.map_err(QueryError::decode)?;
            observations.extend(page.items.into_iter().filter_map(KubeJob::into_observation));

            continue_token = page.metadata.continue_token.filter(|t| !t.is_empty());
            if continue_token.is_none() {
                break;
            }
        }

        debug!("查询到 {} 个作业 (selector: {})", observations.len(), selector);
        Ok(observations)
    }
}

/// `a=b,c=d` → 标签表
///
/// 只处理等值选择器，其他形式在 `Config::validate` 中已被拒绝。
fn selector_labels(selector: &str) -> Map<String, Value> {
    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), json!(v.trim())))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// 从 Kubernetes Status 响应中提取 message
fn status_message(body: &str) -> String {
    serde_json::from_str::<KubeStatus>(body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or_else(|| truncate_text(body, 200))
}

// ========== Kubernetes 响应结构（只取需要的字段） ==========

#[derive(Debug, Deserialize)]
struct KubeStatus {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KubeJobList {
    #[serde(default)]
    items: Vec<KubeJob>,
    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KubeJob {
    metadata: ObjectMeta,
    status: Option<KubeJobStatus>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KubeJobStatus {
    #[serde(default)]
    conditions: Vec<JobCondition>,
}

#[derive(Debug, Deserialize)]
struct JobCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
    reason: Option<String>,
    message: Option<String>,
}

impl JobCondition {
    fn is_true(&self, kind: &str) -> bool {
        self.kind == kind && self.status == "True"
    }
}

impl KubeJob {
    fn into_observation(self) -> Option<JobObservation> {
        let name = self.metadata.name?;
        let conditions = self.status.map(|s| s.conditions).unwrap_or_default();

        let complete = conditions.iter().any(|c| c.is_true("Complete"));
        let failed_condition = conditions.into_iter().find(|c| c.is_true("Failed"));

        Some(JobObservation {
            name,
            complete,
            failed: failed_condition.is_some(),
            reason: failed_condition.as_ref().and_then(|c| c.reason.clone()),
            message: failed_condition.and_then(|c| c.message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceLimits;

    fn runner() -> KubeJobRunner {
        let config = Config {
            kube_api_url: "http://127.0.0.1:8001/".to_string(),
            kube_token_file: "/nonexistent/token".to_string(),
            kube_ca_file: "/nonexistent/ca.crt".to_string(),
            ..Config::default()
        };
        KubeJobRunner::from_config(&config).unwrap()
    }

    fn spec() -> JobSpec {
        JobSpec {
            job_name: "scraper-batch-4-1700000000000".to_string(),
            batch_id: 4,
            items: vec!["https://a.com/1".to_string(), "https://a.com/2".to_string()],
            parser: "generic-news".to_string(),
            concurrency_hint: 2,
            resources: ResourceLimits::default(),
            deadline_secs: 600,
            dry_run: true,
        }
    }

    #[test]
    fn test_jobs_url_trims_trailing_slash() {
        assert_eq!(
            runner().jobs_url(),
            "http://127.0.0.1:8001/apis/batch/v1/namespaces/web-scraper/jobs"
        );
    }

    #[test]
    fn test_render_manifest() {
        let manifest = runner().render_manifest(&spec());

        assert_eq!(manifest["metadata"]["name"], "scraper-batch-4-1700000000000");
        assert_eq!(manifest["metadata"]["labels"]["orchestrator-managed"], "true");
        assert_eq!(manifest["metadata"]["labels"]["batch-id"], "4");
        assert_eq!(manifest["spec"]["activeDeadlineSeconds"], 600);
        assert_eq!(manifest["spec"]["backoffLimit"], 2);
        assert_eq!(manifest["spec"]["ttlSecondsAfterFinished"], 300);

        let container = &manifest["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(
            container["args"],
            json!([
                "--parser",
                "generic-news",
                "--urls",
                "https://a.com/1,https://a.com/2",
                "--max-concurrency",
                "2"
            ])
        );
        assert_eq!(container["env"][0]["value"], "true");
        assert_eq!(container["resources"]["limits"]["memory"], "512Mi");
    }

    #[test]
    fn test_condition_mapping() {
        let body = r#"{
            "items": [
                {"metadata": {"name": "a"}, "status": {"conditions": [{"type": "Complete", "status": "True"}]}},
                {"metadata": {"name": "b"}, "status": {"conditions": [
                    {"type": "Failed", "status": "True", "reason": "DeadlineExceeded", "message": "Job was active longer than specified deadline"}
                ]}},
                {"metadata": {"name": "c"}, "status": {"active": 1}},
                {"metadata": {"name": "d"}, "status": {"conditions": [{"type": "Complete", "status": "False"}]}},
                {"metadata": {}}
            ],
            "metadata": {"continue": ""}
        }"#;

        let list: KubeJobList = serde_json::from_str(body).unwrap();
        let observations: Vec<JobObservation> =
            list.items.into_iter().filter_map(KubeJob::into_observation).collect();

        assert_eq!(observations.len(), 4);
        assert_eq!(observations[0], JobObservation::completed("a"));
        assert!(observations[1].failed);
        assert_eq!(observations[1].reason.as_deref(), Some("DeadlineExceeded"));
        assert_eq!(observations[2], JobObservation::pending("c"));
        assert_eq!(observations[3], JobObservation::pending("d"));
    }

    #[test]
    fn test_status_message_prefers_kube_status() {
        let body = r#"{"kind":"Status","message":"jobs.batch \"x\" already exists","code":409}"#;
        assert_eq!(status_message(body), "jobs.batch \"x\" already exists");
        assert_eq!(status_message("plain error"), "plain error");
    }

    #[test]
    fn test_selector_labels() {
        let labels = selector_labels("orchestrator-managed=true, team=crawl");
        assert_eq!(labels["orchestrator-managed"], "true");
        assert_eq!(labels["team"], "crawl");
    }
}
