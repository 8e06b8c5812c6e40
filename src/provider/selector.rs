//! Provider 选择器
//!
//! 维护可启停、带优先级的 Provider 注册表，按「首选 → 优先级升序 → 第一个
//! 可用」解析出当前最佳 Provider。注册/启停/设首选可与进行中的选择并发；
//! 每次选择对注册表取一次快照，迭代期间不重读。

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::provider::traits::{
    CallOptions, ChatMessage, Provider, ProviderConfig, ProviderError, ProviderKind,
};

/// providers_status 的单行输出；对外序列化时 kind 命名为 type
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub available: bool,
    pub enabled: bool,
}

#[derive(Clone)]
struct RegisteredProvider {
    config: ProviderConfig,
    provider: Arc<dyn Provider>,
}

/// 多 Provider 注册表 + 最佳可用解析
#[derive(Default)]
pub struct ProviderSelector {
    /// 注册顺序即同优先级时的先后顺序
    providers: RwLock<Vec<RegisteredProvider>>,
    preferred: RwLock<Option<String>>,
}

impl ProviderSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个 Provider；同名注册覆盖旧条目（保留原注册位置）
    pub async fn register(&self, config: ProviderConfig, provider: Arc<dyn Provider>) {
        let mut providers = self.providers.write().await;
        let entry = RegisteredProvider { config, provider };
        if let Some(existing) = providers
            .iter_mut()
            .find(|p| p.config.name == entry.config.name)
        {
            *existing = entry;
        } else {
            providers.push(entry);
        }
    }

    /// 设置首选 Provider；必须已注册
    pub async fn set_preferred_provider(&self, name: &str) -> Result<(), ProviderError> {
        let providers = self.providers.read().await;
        if !providers.iter().any(|p| p.config.name == name) {
            return Err(ProviderError::NotRegistered(name.to_string()));
        }
        drop(providers);
        *self.preferred.write().await = Some(name.to_string());
        Ok(())
    }

    pub async fn preferred_provider(&self) -> Option<String> {
        self.preferred.read().await.clone()
    }

    pub async fn clear_preferred_provider(&self) {
        *self.preferred.write().await = None;
    }

    /// 启用/停用某个 Provider
    pub async fn set_provider_enabled(
        &self,
        name: &str,
        enabled: bool,
    ) -> Result<(), ProviderError> {
        let mut providers = self.providers.write().await;
        let entry = providers
            .iter_mut()
            .find(|p| p.config.name == name)
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))?;
        entry.config.enabled = enabled;
        Ok(())
    }

    /// 调整优先级（越小越先尝试）
    pub async fn set_provider_priority(
        &self,
        name: &str,
        priority: u32,
    ) -> Result<(), ProviderError> {
        let mut providers = self.providers.write().await;
        let entry = providers
            .iter_mut()
            .find(|p| p.config.name == name)
            .ok_or_else(|| ProviderError::NotRegistered(name.to_string()))?;
        entry.config.priority = priority;
        Ok(())
    }

    /// 解析当前最佳可用 Provider
    ///
    /// 1. 首选名已注册、启用且探测可用 → 直接返回
    /// 2. 否则启用的 Provider 按优先级升序（同值按注册顺序）逐个探测，
    ///    返回第一个可用的
    /// 3. 全部不可用 → NoProviderAvailable
    pub async fn best_provider(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        // 快照：选择过程中注册表可被并发修改，但本次迭代只看这一份
        let snapshot: Vec<RegisteredProvider> = self.providers.read().await.clone();
        let preferred = self.preferred.read().await.clone();

        if let Some(name) = preferred {
            if let Some(entry) = snapshot
                .iter()
                .find(|p| p.config.name == name && p.config.enabled)
            {
                if entry.provider.available().await {
                    return Ok(entry.provider.clone());
                }
                tracing::warn!(provider = %name, "Preferred provider unavailable, falling back");
            }
        }

        let mut enabled: Vec<&RegisteredProvider> =
            snapshot.iter().filter(|p| p.config.enabled).collect();
        // 稳定排序：同优先级保持注册顺序
        enabled.sort_by_key(|p| p.config.priority);

        for entry in enabled {
            if entry.provider.available().await {
                tracing::debug!(provider = %entry.config.name, "Selected provider");
                return Ok(entry.provider.clone());
            }
        }

        Err(ProviderError::NoProviderAvailable)
    }

    /// 探测所有已注册 Provider 的状态（与选择逻辑无关，全部都探测）
    pub async fn providers_status(&self) -> Vec<ProviderStatus> {
        let snapshot: Vec<RegisteredProvider> = self.providers.read().await.clone();
        let probes = snapshot.iter().map(|entry| {
            let provider = entry.provider.clone();
            async move { provider.available().await }
        });
        let availability = join_all(probes).await;

        snapshot
            .iter()
            .zip(availability)
            .map(|(entry, available)| ProviderStatus {
                name: entry.config.name.clone(),
                kind: entry.config.kind,
                available,
                enabled: entry.config.enabled,
            })
            .collect()
    }

    /// 解析最佳 Provider 后委托 complete
    pub async fn complete(
        &self,
        prompt: &str,
        opts: &CallOptions,
    ) -> Result<String, ProviderError> {
        let provider = self.best_provider().await?;
        provider.complete(prompt, opts).await
    }

    /// 解析最佳 Provider 后委托 chat
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> Result<String, ProviderError> {
        let provider = self.best_provider().await?;
        provider.chat(messages, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    async fn selector_with(
        entries: Vec<(&str, u32, bool, bool)>, // (name, priority, enabled, available)
    ) -> ProviderSelector {
        let selector = ProviderSelector::new();
        for (name, priority, enabled, available) in entries {
            let mut config = ProviderConfig::new(name, ProviderKind::Local, priority);
            config.enabled = enabled;
            selector
                .register(
                    config,
                    Arc::new(MockProvider::new(name).with_availability(available)),
                )
                .await;
        }
        selector
    }

    #[tokio::test]
    async fn test_falls_back_past_unavailable_provider() {
        // A 优先级更高但不可用 → 返回 B
        let selector = selector_with(vec![
            ("provider_a", 1, true, false),
            ("provider_b", 2, true, true),
        ])
        .await;

        let best = selector.best_provider().await.unwrap();
        assert_eq!(best.name(), "provider_b");
    }

    #[tokio::test]
    async fn test_all_disabled_is_unavailable() {
        let selector = selector_with(vec![
            ("provider_a", 1, false, true),
            ("provider_b", 2, false, true),
        ])
        .await;

        let err = match selector.best_provider().await {
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
            Err(e) => e,
        };
        assert!(matches!(err, ProviderError::NoProviderAvailable));
        assert_eq!(err.to_string(), "No LLM provider available");
    }

    #[tokio::test]
    async fn test_selection_is_deterministic() {
        let selector = selector_with(vec![
            ("provider_a", 2, true, true),
            ("provider_b", 1, true, true),
            ("provider_c", 1, true, true),
        ])
        .await;

        // 固定注册表 + 固定可用性 → 每次都选同一个（优先级 1 中先注册的 B）
        for _ in 0..5 {
            let best = selector.best_provider().await.unwrap();
            assert_eq!(best.name(), "provider_b");
        }
    }

    #[tokio::test]
    async fn test_preferred_wins_when_available() {
        let selector = selector_with(vec![
            ("provider_a", 1, true, true),
            ("provider_b", 2, true, true),
        ])
        .await;

        selector.set_preferred_provider("provider_b").await.unwrap();
        let best = selector.best_provider().await.unwrap();
        assert_eq!(best.name(), "provider_b");
    }

    #[tokio::test]
    async fn test_unavailable_preferred_falls_back_to_priority() {
        let selector = selector_with(vec![
            ("provider_a", 1, true, true),
            ("provider_b", 2, true, false),
        ])
        .await;

        selector.set_preferred_provider("provider_b").await.unwrap();
        let best = selector.best_provider().await.unwrap();
        assert_eq!(best.name(), "provider_a");
    }

    #[tokio::test]
    async fn test_set_preferred_requires_registration() {
        let selector = selector_with(vec![("provider_a", 1, true, true)]).await;
        let err = selector.set_preferred_provider("ghost").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_disable_then_enable_round_trip() {
        let selector = selector_with(vec![("provider_a", 1, true, true)]).await;

        selector
            .set_provider_enabled("provider_a", false)
            .await
            .unwrap();
        assert!(selector.best_provider().await.is_err());

        selector
            .set_provider_enabled("provider_a", true)
            .await
            .unwrap();
        assert!(selector.best_provider().await.is_ok());
    }

    #[tokio::test]
    async fn test_providers_status_probes_everything() {
        let selector = selector_with(vec![
            ("provider_a", 1, true, true),
            ("provider_b", 2, false, false),
        ])
        .await;

        let status = selector.providers_status().await;
        assert_eq!(status.len(), 2);
        assert!(status[0].available && status[0].enabled);
        assert!(!status[1].available && !status[1].enabled);
    }
}
