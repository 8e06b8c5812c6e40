//! Provider 层：后端抽象、优先级选择器与实现（Ollama / OpenAI 兼容 / Mock）

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod selector;
pub mod traits;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use selector::{ProviderSelector, ProviderStatus};
pub use traits::{
    CallOptions, ChatMessage, Provider, ProviderConfig, ProviderError, ProviderKind, Role,
};
