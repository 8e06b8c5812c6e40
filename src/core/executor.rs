//! 目标执行器：分解 → 依赖检查 → 工具调用 → 聚合 → 持久化
//!
//! 任务级失败只记录在 Task 上并继续后面的任务；编排级失败发射一条 validation
//! 思考步骤后向调用方抛出，且不写入存储。默认严格按声明顺序逐个执行，
//! 配置开启后切换到拓扑并行调度器（见 scheduler.rs），对外契约不变。

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::core::decompose::decompose;
use crate::core::error::AgentError;
use crate::core::goal::{GoalContext, Stage, Task, TaskStatus};
use crate::core::scheduler;
use crate::core::thinking::{SubscriptionId, ThinkingKind, ThinkingLog, ThinkingStep};
use crate::memory::{GoalRecord, MemoryStore};
use crate::tools::{Tool, ToolInput, ToolRegistry};

const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// 调度模式：默认声明序逐个执行；Parallel 为拓扑并行（配置开启）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Sequential,
    Parallel { max_workers: usize },
}

/// 目标执行器
///
/// 注册表与存储均为构造注入，不依赖任何进程级单例；同一个执行器可
/// 顺序处理多个目标，思考日志跨目标累积，由调用方决定何时 clear。
pub struct GoalExecutor {
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    thinking: Arc<ThinkingLog>,
    tool_timeout: Duration,
    mode: SchedulerMode,
}

impl GoalExecutor {
    pub fn new(tools: Arc<ToolRegistry>, memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            tools,
            memory,
            thinking: Arc::new(ThinkingLog::new()),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            mode: SchedulerMode::Sequential,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_scheduler_mode(mut self, mode: SchedulerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_thinking_log(mut self, log: Arc<ThinkingLog>) -> Self {
        self.thinking = log;
        self
    }

    /// 订阅思考步骤；返回退订用 ID
    pub fn on_thinking<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ThinkingStep) + Send + Sync + 'static,
    {
        self.thinking.on_thinking(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.thinking.unsubscribe(id);
    }

    pub fn thinking_history(&self) -> Vec<ThinkingStep> {
        self.thinking.history()
    }

    pub fn clear_thinking_history(&self) {
        self.thinking.clear();
    }

    pub fn thinking_log(&self) -> Arc<ThinkingLog> {
        self.thinking.clone()
    }

    /// 执行一个目标；不可取消版本
    pub async fn execute_goal(&self, goal: &str, stage: Stage) -> Result<GoalContext, AgentError> {
        self.execute_goal_with_cancel(goal, stage, CancellationToken::new())
            .await
    }

    /// 执行一个目标；token 取消时：当前任务置为失败，未开始任务标记
    /// `cancelled`，不写入存储，向调用方返回 Cancelled
    pub async fn execute_goal_with_cancel(
        &self,
        goal: &str,
        stage: Stage,
        cancel: CancellationToken,
    ) -> Result<GoalContext, AgentError> {
        let result = self.run(goal, stage, cancel).await;
        if let Err(ref e) = result {
            self.thinking.emit(ThinkingStep::new(
                ThinkingKind::Validation,
                format!("Goal execution aborted: {}", e),
            ));
        }
        result
    }

    async fn run(
        &self,
        goal: &str,
        stage: Stage,
        cancel: CancellationToken,
    ) -> Result<GoalContext, AgentError> {
        let mut context = GoalContext::new(goal, stage);
        tracing::info!(goal, stage = stage.as_str(), context_id = %context.id, "Starting goal execution");

        self.thinking.emit(ThinkingStep::new(
            ThinkingKind::Decomposition,
            format!("Breaking down goal: {} (stage: {})", goal, stage.as_str()),
        ));

        context.tasks = decompose(goal, stage);
        self.thinking.emit(
            ThinkingStep::new(
                ThinkingKind::Decomposition,
                format!("Decomposed into {} tasks", context.tasks.len()),
            )
            .with_metadata(json!({ "task_count": context.tasks.len() })),
        );

        match self.mode {
            SchedulerMode::Sequential => self.run_sequential(&mut context, &cancel).await?,
            SchedulerMode::Parallel { max_workers } => {
                scheduler::run_parallel(
                    self.tools.clone(),
                    self.thinking.clone(),
                    &mut context,
                    max_workers,
                    self.tool_timeout,
                    &cancel,
                )
                .await?
            }
        }

        context.results = context
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.result.clone())
            .collect();

        let (done, total) = context.completion_counts();
        self.thinking.emit(ThinkingStep::new(
            ThinkingKind::Validation,
            format!("Goal execution finished: {}/{} tasks completed", done, total),
        ));

        let record = GoalRecord {
            context_id: context.id.clone(),
            goal: context.goal.clone(),
            stage: context.stage,
            tasks: context.tasks.clone(),
            results: context.results.clone(),
            completed_at: chrono::Utc::now().timestamp_millis(),
        };
        self.memory
            .store(record)
            .await
            .map_err(AgentError::MemoryStoreFailed)?;

        tracing::info!(context_id = %context.id, done, total, "Goal execution stored");
        Ok(context)
    }

    /// 严格按任务数组顺序逐个执行
    async fn run_sequential(
        &self,
        context: &mut GoalContext,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let goal = context.goal.clone();
        let stage = context.stage;

        for i in 0..context.tasks.len() {
            if cancel.is_cancelled() {
                mark_unfinished_cancelled(&mut context.tasks[i..]);
                return Err(AgentError::Cancelled);
            }

            // 依赖检查与工具解析；返回 None 表示任务已在此处终态化
            let pending_call = {
                let (earlier, rest) = context.tasks.split_at_mut(i);
                let task = &mut rest[0];

                let unmet = unmet_dependencies(task, earlier);
                if !unmet.is_empty() {
                    task.status = TaskStatus::Failed;
                    task.error =
                        Some(AgentError::DependenciesNotMet(unmet.join(", ")).to_string());
                    None
                } else if let Some(tool_name) = task.tool.clone() {
                    if let Some(tool) = self.tools.get(&tool_name) {
                        task.status = TaskStatus::Running;
                        self.thinking.emit(
                            ThinkingStep::new(
                                ThinkingKind::ToolSelection,
                                format!("Selected tool {} for: {}", tool_name, task.description),
                            )
                            .with_tool(&tool_name),
                        );
                        let input = ToolInput {
                            goal: goal.clone(),
                            stage,
                            previous_results: dependency_results(task, earlier),
                        };
                        Some((tool, input))
                    } else {
                        task.status = TaskStatus::Failed;
                        task.error = Some(AgentError::ToolNotFound(tool_name).to_string());
                        None
                    }
                } else {
                    // 无工具的占位任务
                    task.status = TaskStatus::Completed;
                    None
                }
            };

            let Some((tool, input)) = pending_call else {
                continue;
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = invoke_tool(tool, input, self.tool_timeout) => Some(outcome),
            };

            match outcome {
                Some(outcome) => apply_outcome(&mut context.tasks[i], outcome, &self.thinking),
                None => {
                    context.tasks[i].status = TaskStatus::Failed;
                    context.tasks[i].error = Some("cancelled".to_string());
                    mark_unfinished_cancelled(&mut context.tasks[i + 1..]);
                    return Err(AgentError::Cancelled);
                }
            }
        }

        Ok(())
    }
}

/// 未完成依赖的 id 列表；解析不到的 id 同样视为未满足
pub(crate) fn unmet_dependencies(task: &Task, earlier: &[Task]) -> Vec<String> {
    task.depends_on
        .iter()
        .filter(|id| {
            earlier
                .iter()
                .find(|t| &t.id == *id)
                .map(|t| t.status != TaskStatus::Completed)
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

/// 已完成依赖的结果，按依赖声明顺序；失败或无结果的依赖直接略去
pub(crate) fn dependency_results(task: &Task, earlier: &[Task]) -> Vec<serde_json::Value> {
    task.depends_on
        .iter()
        .filter_map(|id| earlier.iter().find(|t| &t.id == id))
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| t.result.clone())
        .collect()
}

/// 工具调用结果
pub(crate) enum TaskOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

/// 执行一次工具调用：先 validate，再在超时内 execute
pub(crate) async fn invoke_tool(
    tool: Arc<dyn Tool>,
    input: ToolInput,
    timeout: Duration,
) -> TaskOutcome {
    if !tool.validate(&input) {
        return TaskOutcome::Failed(
            AgentError::ToolExecutionFailed(format!("Input rejected by {}", tool.name()))
                .to_string(),
        );
    }

    match tokio::time::timeout(timeout, tool.execute(&input)).await {
        Ok(Ok(value)) => TaskOutcome::Completed(value),
        Ok(Err(e)) => TaskOutcome::Failed(AgentError::ToolExecutionFailed(e).to_string()),
        Err(_) => TaskOutcome::Failed(
            AgentError::ToolTimeout(format!(
                "{} exceeded {}s",
                tool.name(),
                timeout.as_secs()
            ))
            .to_string(),
        ),
    }
}

/// 将调用结果写回任务并发射对应思考步骤
pub(crate) fn apply_outcome(task: &mut Task, outcome: TaskOutcome, thinking: &ThinkingLog) {
    match outcome {
        TaskOutcome::Completed(value) => {
            // 结果规模提示：数组取长度，其余记 1
            let size_hint = value.as_array().map(|a| a.len()).unwrap_or(1);
            let tool = task.tool.clone().unwrap_or_default();
            thinking.emit(
                ThinkingStep::new(
                    ThinkingKind::Execution,
                    format!("Executed {}: {} result item(s)", tool, size_hint),
                )
                .with_tool(tool)
                .with_metadata(json!({ "result_size": size_hint })),
            );
            task.result = Some(value);
            task.status = TaskStatus::Completed;
        }
        TaskOutcome::Failed(error) => {
            let mut step = ThinkingStep::new(
                ThinkingKind::Validation,
                format!("Task failed: {}", error),
            );
            if let Some(tool) = &task.tool {
                step = step.with_tool(tool);
            }
            thinking.emit(step);
            task.error = Some(error);
            task.status = TaskStatus::Failed;
        }
    }
}

/// 取消时把所有未终态任务标记为失败（原因 cancelled）
pub(crate) fn mark_unfinished_cancelled(tasks: &mut [Task]) {
    for task in tasks {
        if !task.status.is_finished() {
            task.status = TaskStatus::Failed;
            task.error = Some("cancelled".to_string());
        }
    }
}
