//! 本地服务自修复
//!
//! 探测 + 进程存活检查组合出三种结论，驱动上层的用户引导文案：
//! - auto_detected：服务已找到，附带可直接写回配置的 URL/模型
//! - server_not_ready：进程在跑但健康端点拒绝（通常是模型还没加载完）
//! - not_running：根本没有检测到进程

use std::sync::Arc;

use serde::Serialize;

use crate::probe::detector::{ProcessCheck, ServiceProber};

/// 修复结论；三种取值对上层语义固定，不得合并或改名
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// 服务已找到；携带解析出的配置补丁
    AutoDetected {
        base_url: String,
        model: Option<String>,
    },
    /// 进程在跑，健康端点拒绝
    ServerNotReady,
    /// 进程未检测到
    NotRunning,
}

/// 自修复：先探测服务，失败时再区分「没起来」与「起了但没就绪」
pub struct SelfRepair {
    prober: ServiceProber,
    process: Arc<dyn ProcessCheck>,
}

impl SelfRepair {
    pub fn new(prober: ServiceProber, process: Arc<dyn ProcessCheck>) -> Self {
        Self { prober, process }
    }

    pub async fn repair(&self, ports: &[u16]) -> RepairOutcome {
        let status = self.prober.detect_service(ports).await;
        if status.available {
            // detect_service 返回 available 时必然带 base_url
            let base_url = status.base_url.unwrap_or_default();
            tracing::info!(%base_url, "Self-repair resolved endpoint");
            return RepairOutcome::AutoDetected {
                base_url,
                model: status.model,
            };
        }

        if self.process.is_running().await {
            tracing::warn!("Process detected but health endpoint refused");
            RepairOutcome::ServerNotReady
        } else {
            tracing::warn!("No local service process detected");
            RepairOutcome::NotRunning
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::detector::{EndpointProbe, ServiceMetadata};
    use async_trait::async_trait;

    struct FixedProbe {
        respond: bool,
    }

    #[async_trait]
    impl EndpointProbe for FixedProbe {
        async fn fetch_metadata(&self, _base_url: &str) -> Result<ServiceMetadata, String> {
            if self.respond {
                Ok(ServiceMetadata {
                    model: Some("llama3".to_string()),
                })
            } else {
                Err("refused".to_string())
            }
        }
    }

    struct FixedProcess {
        running: bool,
    }

    #[async_trait]
    impl ProcessCheck for FixedProcess {
        async fn is_running(&self) -> bool {
            self.running
        }
    }

    fn repairer(respond: bool, running: bool) -> SelfRepair {
        SelfRepair::new(
            ServiceProber::new("svc", Arc::new(FixedProbe { respond })),
            Arc::new(FixedProcess { running }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_detected_service_yields_config_patch() {
        let outcome = repairer(true, true).repair(&[1234]).await;
        assert_eq!(
            outcome,
            RepairOutcome::AutoDetected {
                base_url: "http://127.0.0.1:1234".to_string(),
                model: Some("llama3".to_string()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_process_without_health_is_not_ready() {
        let outcome = repairer(false, true).repair(&[1234]).await;
        assert_eq!(outcome, RepairOutcome::ServerNotReady);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_process_is_not_running() {
        let outcome = repairer(false, false).repair(&[1234]).await;
        assert_eq!(outcome, RepairOutcome::NotRunning);
    }

    #[test]
    fn test_outcome_tags_are_stable() {
        // 三种结论的序列化名对上层 UI 是契约
        let json = serde_json::to_value(RepairOutcome::ServerNotReady).unwrap();
        assert_eq!(json["outcome"], "server_not_ready");
        let json = serde_json::to_value(RepairOutcome::NotRunning).unwrap();
        assert_eq!(json["outcome"], "not_running");
        let json = serde_json::to_value(RepairOutcome::AutoDetected {
            base_url: "http://127.0.0.1:1234".to_string(),
            model: None,
        })
        .unwrap();
        assert_eq!(json["outcome"], "auto_detected");
    }
}
