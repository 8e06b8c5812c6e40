//! 装配：从配置构建 Provider 选择器与目标执行器
//!
//! 注册表、存储、思考日志全部显式注入，没有进程级单例；
//! 测试可以各建各的实例互不影响。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::executor::{GoalExecutor, SchedulerMode};
use crate::memory::MemoryStore;
use crate::probe::{
    HttpMetadataProbe, RetryPolicy, SelfRepair, ServiceProber, TcpProcessCheck,
};
use crate::provider::{
    CallOptions, OllamaProvider, OpenAiProvider, ProviderConfig, ProviderKind, ProviderSelector,
};
use crate::tools::ToolRegistry;

/// 按配置与环境变量注册 Provider：本地 Ollama 优先级 0，
/// 有 OPENAI_API_KEY 时再注册云端（优先级 1）作为回退
pub async fn create_provider_selector(cfg: &AppConfig) -> ProviderSelector {
    let selector = ProviderSelector::new();

    selector
        .register(
            ProviderConfig::new("ollama", ProviderKind::Local, 0)
                .with_default_model(&cfg.provider.ollama.model),
            Arc::new(OllamaProvider::new(
                &cfg.provider.ollama.base_url,
                &cfg.provider.ollama.model,
            )),
        )
        .await;

    if std::env::var("OPENAI_API_KEY").is_ok() {
        let model = cfg
            .provider
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Registering OpenAI-compatible provider ({})", model);
        selector
            .register(
                ProviderConfig::new("openai", ProviderKind::Cloud, 1)
                    .with_default_model(&model),
                Arc::new(OpenAiProvider::new(
                    cfg.provider.openai.base_url.as_deref(),
                    &model,
                    None,
                )),
            )
            .await;
    } else {
        tracing::warn!("OPENAI_API_KEY not set, cloud provider not registered");
    }

    if let Some(preferred) = &cfg.provider.preferred {
        if let Err(e) = selector.set_preferred_provider(preferred).await {
            tracing::warn!("Ignoring preferred provider: {}", e);
        }
    }

    selector
}

/// 构建目标执行器；调度模式与工具超时来自配置
pub fn create_goal_executor(
    cfg: &AppConfig,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
) -> GoalExecutor {
    let mode = if cfg.agent.parallel_scheduler {
        SchedulerMode::Parallel {
            max_workers: cfg.agent.max_workers,
        }
    } else {
        SchedulerMode::Sequential
    };

    GoalExecutor::new(tools, memory)
        .with_tool_timeout(Duration::from_secs(cfg.agent.tool_timeout_secs))
        .with_scheduler_mode(mode)
}

/// 按配置构造 Provider 调用选项（超时来自 [provider] 段）
pub fn call_options_from_config(cfg: &AppConfig) -> CallOptions {
    CallOptions {
        timeout: Duration::from_secs(cfg.provider.request_timeout_secs),
        ..CallOptions::default()
    }
}

/// 按配置构建本地服务自修复（探测器 + 进程存活检查共用同一重试策略）
pub fn create_self_repair(cfg: &AppConfig) -> SelfRepair {
    let policy = RetryPolicy::new(
        cfg.probe.max_attempts,
        Duration::from_secs(cfg.probe.attempt_timeout_secs),
    );
    let prober = ServiceProber::new("lm_studio", Arc::new(HttpMetadataProbe::default()))
        .with_policy(policy);
    let process = TcpProcessCheck::new(cfg.probe.ports.clone()).with_policy(policy);
    SelfRepair::new(prober, Arc::new(process))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn test_selector_always_has_local_provider() {
        let selector = create_provider_selector(&AppConfig::default()).await;
        let status = selector.providers_status().await;
        assert!(status.iter().any(|s| s.name == "ollama"));
    }

    #[test]
    fn test_call_options_take_configured_timeout() {
        let mut cfg = AppConfig::default();
        cfg.provider.request_timeout_secs = 30;
        let opts = call_options_from_config(&cfg);
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert!(opts.model.is_none());
    }

    #[tokio::test]
    async fn test_executor_mode_follows_config() {
        let mut cfg = AppConfig::default();
        cfg.agent.parallel_scheduler = true;
        cfg.agent.max_workers = 2;

        let executor = create_goal_executor(
            &cfg,
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemoryStore::new()),
        );
        // 仅验证能构建；调度行为由 executor/scheduler 测试覆盖
        assert!(executor.thinking_history().is_empty());
    }
}
