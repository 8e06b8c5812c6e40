//! Mock Provider（用于测试，无需任何后端）

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::provider::traits::{
    reject_blank, CallOptions, ChatMessage, Provider, ProviderError, ProviderKind,
};

/// Mock Provider：可脚本化可用性与回复，并统计探测/调用次数
pub struct MockProvider {
    name: String,
    kind: ProviderKind,
    available: bool,
    reply: String,
    probe_count: AtomicUsize,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::Local,
            available: true,
            reply: "mock reply".to_string(),
            probe_count: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn kind_of(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn reply_with(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::Relaxed)
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn available(&self) -> bool {
        self.probe_count.fetch_add(1, Ordering::Relaxed);
        self.available
    }

    async fn complete(&self, _prompt: &str, _opts: &CallOptions) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        reject_blank(&self.name, self.reply.clone())
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _opts: &CallOptions,
    ) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        reject_blank(&self.name, self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_reply_is_an_error() {
        let provider = MockProvider::new("mock").reply_with("   ");
        let err = provider
            .complete("hi", &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_counters() {
        let provider = MockProvider::new("mock");
        provider.available().await;
        provider.available().await;
        let _ = provider.complete("hi", &CallOptions::default()).await;
        assert_eq!(provider.probe_count(), 2);
        assert_eq!(provider.call_count(), 1);
    }
}
