//! Ollama 本地 Provider
//!
//! 探测 GET /api/tags（约 5 秒超时，任何失败折算为不可用）；
//! complete 走 /api/generate，chat 走 /api/chat，均为非流式。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::provider::traits::{
    reject_blank, with_deadline, CallOptions, ChatMessage, Provider, ProviderError, ProviderKind,
    Role, PROBE_TIMEOUT,
};

/// Ollama 客户端：持有端点与默认模型
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn model_for(&self, opts: &CallOptions) -> String {
        opts.model.clone().unwrap_or_else(|| self.model.clone())
    }

    fn options_for(&self, opts: &CallOptions) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(temperature) = opts.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = opts.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        Value::Object(options)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::api("ollama", e))?;
        if !resp.status().is_success() {
            return Err(ProviderError::api("ollama", format!("HTTP {}", resp.status())));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::api("ollama", e))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let probe = self.client.get(&url).timeout(PROBE_TIMEOUT).send();
        match probe.await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Ollama probe failed");
                false
            }
        }
    }

    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model_for(opts),
            "prompt": prompt,
            "stream": false,
            "options": self.options_for(opts),
        });

        let response = with_deadline("ollama", opts.timeout, self.post_json("/api/generate", body))
            .await?;
        let content = response["response"].as_str().unwrap_or_default().to_string();
        reject_blank("ollama", content)
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> Result<String, ProviderError> {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        let body = json!({
            "model": self.model_for(opts),
            "messages": api_messages,
            "stream": false,
            "options": self.options_for(opts),
        });

        let response =
            with_deadline("ollama", opts.timeout, self.post_json("/api/chat", body)).await?;
        let content = response["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        reject_blank("ollama", content)
    }

    async fn models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::api("ollama", e))?;
        let body: Value = resp.json().await.map_err(|e| ProviderError::api("ollama", e))?;

        let models = body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }
}
