//! 本地服务探测
//!
//! 按固定优先级扫描候选端口，每个端口用有界重试抓一次元数据；
//! 第一个成功的端口短路整个扫描。detect_service 不抛错，总是返回
//! 一份新的 ServiceStatus 快照，跨探测不缓存。

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;

use crate::probe::retry::{with_retry, RetryPolicy};

/// 一次探测的结果快照
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// 服务名（如 "lm_studio"）
    pub service: String,
    pub available: bool,
    /// 命中的端点
    pub base_url: Option<String>,
    /// 从元数据响应中解析出的模型标识
    pub model: Option<String>,
    /// 未找到时的错误描述
    pub error: Option<String>,
}

/// 端点元数据
#[derive(Debug, Clone, Default)]
pub struct ServiceMetadata {
    pub model: Option<String>,
}

/// 元数据抓取 seam；测试注入假实现，生产用 HttpMetadataProbe
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn fetch_metadata(&self, base_url: &str) -> Result<ServiceMetadata, String>;
}

/// HTTP 元数据探测：GET {base_url}{path}，从 OpenAI 风格的 /v1/models
/// 响应里取第一个模型 id
pub struct HttpMetadataProbe {
    client: Client,
    path: String,
}

impl HttpMetadataProbe {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            path: path.into(),
        }
    }
}

impl Default for HttpMetadataProbe {
    fn default() -> Self {
        Self::new("/v1/models")
    }
}

#[async_trait]
impl EndpointProbe for HttpMetadataProbe {
    async fn fetch_metadata(&self, base_url: &str) -> Result<ServiceMetadata, String> {
        let url = format!("{}{}", base_url, self.path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        let body: Value = resp.json().await.map_err(|e| format!("bad body: {}", e))?;
        let model = body["data"]
            .as_array()
            .and_then(|models| models.first())
            .and_then(|m| m["id"].as_str())
            .map(String::from);
        Ok(ServiceMetadata { model })
    }
}

/// 多端口服务探测器
pub struct ServiceProber {
    service: String,
    host: String,
    probe: Arc<dyn EndpointProbe>,
    policy: RetryPolicy,
}

impl ServiceProber {
    pub fn new(service: impl Into<String>, probe: Arc<dyn EndpointProbe>) -> Self {
        Self {
            service: service.into(),
            host: "127.0.0.1".to_string(),
            probe,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 扫描候选端口；永不出错，总是返回状态快照
    pub async fn detect_service(&self, ports: &[u16]) -> ServiceStatus {
        for &port in ports {
            let base_url = format!("http://{}:{}", self.host, port);
            let probe = self.probe.clone();
            let result = with_retry(&self.policy, || {
                let probe = probe.clone();
                let base_url = base_url.clone();
                async move { probe.fetch_metadata(&base_url).await }
            })
            .await;

            match result {
                Ok(metadata) => {
                    tracing::info!(service = %self.service, %base_url, "Service detected");
                    return ServiceStatus {
                        service: self.service.clone(),
                        available: true,
                        base_url: Some(base_url),
                        model: metadata.model,
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::debug!(service = %self.service, port, error = %e, "Port exhausted");
                }
            }
        }

        let port_list = ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        ServiceStatus {
            service: self.service.clone(),
            available: false,
            base_url: None,
            model: None,
            error: Some(format!("Could not connect on any port ({})", port_list)),
        }
    }
}

/// 进程存活 seam：区分「端口有人监听」与「健康端点可用」
#[async_trait]
pub trait ProcessCheck: Send + Sync {
    async fn is_running(&self) -> bool;
}

/// TCP 连接探测：任一候选端口接受连接即认为伴生进程在跑。
/// 复用与端口扫描完全相同的重试/退避策略。
pub struct TcpProcessCheck {
    host: String,
    ports: Vec<u16>,
    policy: RetryPolicy,
}

impl TcpProcessCheck {
    pub fn new(ports: Vec<u16>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ProcessCheck for TcpProcessCheck {
    async fn is_running(&self) -> bool {
        for &port in &self.ports {
            let addr = format!("{}:{}", self.host, port);
            let result = with_retry(&self.policy, || {
                let addr = addr.clone();
                async move {
                    TcpStream::connect(&addr)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            })
            .await;
            if result.is_ok() {
                return true;
            }
        }
        false
    }
}

/// 通用后端健康检查：GET url 成功即健康；同一套重试策略
pub async fn check_backend_health(url: &str, policy: &RetryPolicy) -> bool {
    let client = Client::new();
    let result = with_retry(policy, || {
        let client = client.clone();
        let url = url.to_string();
        async move {
            let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(format!("HTTP {}", resp.status()))
            }
        }
    })
    .await;
    result.is_ok()
}
