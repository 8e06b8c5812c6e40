//! 编排错误类型
//!
//! 任务级错误（依赖未满足 / 工具缺失 / 工具执行失败）只记录在 Task 上，不向上抛出；
//! 编排级错误（存储失败、取消）终止本次目标并传给调用方。

use thiserror::Error;

/// 目标执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 记录在 Task.error 上，不抛出
    #[error("Dependencies not met: {0}")]
    DependenciesNotMet(String),

    /// 记录在 Task.error 上，不抛出
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// 记录在 Task.error 上，不抛出
    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// 记录在 Task.error 上，不抛出
    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Goal execution cancelled")]
    Cancelled,

    #[error("Memory store failed: {0}")]
    MemoryStoreFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
