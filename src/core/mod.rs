//! 编排核心：目标分解、依赖任务执行、思考日志、调度与装配

pub mod builder;
pub mod decompose;
pub mod error;
pub mod executor;
pub mod goal;
mod scheduler;
pub mod thinking;

pub use builder::{
    call_options_from_config, create_goal_executor, create_provider_selector, create_self_repair,
};
pub use decompose::decompose;
pub use error::AgentError;
pub use executor::{GoalExecutor, SchedulerMode};
pub use goal::{GoalContext, GoalId, Stage, Task, TaskId, TaskStatus};
pub use thinking::{SubscriptionId, ThinkingKind, ThinkingLog, ThinkingStep};
