//! Sage - Rust 科研编排核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 目标分解、任务依赖执行、思考日志、调度与装配
//! - **memory**: 目标执行记录的存取（内存 / JSON 文件）
//! - **observability**: tracing 初始化
//! - **probe**: 本地服务探测（有界重试 + 退避）与自修复
//! - **provider**: LLM Provider 抽象、优先级选择器与实现（Ollama / OpenAI 兼容 / Mock）
//! - **tools**: 工具 trait 与按名注册表（工具本体由外部系统提供）

pub mod config;
pub mod core;
pub mod memory;
pub mod observability;
pub mod probe;
pub mod provider;
pub mod tools;

pub use crate::core::{
    GoalContext, GoalExecutor, Stage, Task, TaskStatus, ThinkingKind, ThinkingStep,
};
pub use crate::provider::{Provider, ProviderSelector};
