//! LLM Provider 抽象
//!
//! 所有后端（Ollama / OpenAI 兼容 / Mock）实现 Provider：available（可达性探测，
//! 不抛错）、complete（单轮）、chat（多轮），调用统一带截止时间。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 探测超时（available 的上限）
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// complete/chat 默认超时
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    Cloud,
}

/// Provider 注册配置；enabled 与 priority 运行期可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// 唯一名（注册表键）
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    /// 越小越先尝试；同值按注册顺序
    pub priority: u32,
    pub default_model: Option<String>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind, priority: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            priority,
            default_model: None,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

/// 对话消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 一条对话消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 单次调用选项；model 为 None 时用 Provider 默认模型
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// 整次调用的截止时间
    pub timeout: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Provider 层错误
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No LLM provider available")]
    NoProviderAvailable,

    #[error("Provider not registered: {0}")]
    NotRegistered(String),

    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("{provider} error: {message}")]
    Api { provider: String, message: String },
}

impl ProviderError {
    /// 把任意后端失败包上 provider 名
    pub fn api(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// LLM Provider trait
///
/// available 不抛错：任何探测失败折算为 false（云端实现见其 assume-reachable
/// 偏置说明）。complete/chat 超时抛 Timeout，空白响应抛 EmptyResponse。
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// 轻量可达性探测，上限约 5 秒
    async fn available(&self) -> bool;

    /// 单轮补全
    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError>;

    /// 多轮对话
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> Result<String, ProviderError>;

    /// 可选：列出后端模型
    async fn models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

/// 在截止时间内运行底层调用；超时统一转 Timeout 并带上 provider 名。
/// tokio::time::timeout 保证无论哪条路径先完成都不会留下悬挂计时器。
pub(crate) async fn with_deadline<T, F>(
    provider: &str,
    timeout: Duration,
    fut: F,
) -> Result<T, ProviderError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// 空白响应检查；非空白原样返回
pub(crate) fn reject_blank(provider: &str, content: String) -> Result<String, ProviderError> {
    if content.trim().is_empty() {
        Err(ProviderError::EmptyResponse {
            provider: provider.to_string(),
        })
    } else {
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<(), _> = with_deadline("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(ProviderError::Timeout {
                provider,
                timeout_ms,
            }) => {
                assert_eq!(provider, "slow");
                assert_eq!(timeout_ms, 10);
            }
            other => panic!("expected timeout, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_reject_blank() {
        assert!(reject_blank("p", "  \n".to_string()).is_err());
        assert_eq!(reject_blank("p", "ok".to_string()).unwrap(), "ok");
    }
}
