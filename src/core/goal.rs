//! 目标与任务类型
//!
//! GoalContext 由一次 execute_goal 调用独占；Task 只在执行循环中被修改，
//! 依赖 id 只引用同一上下文中更早创建的任务，不允许前向引用。

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type GoalId = String;
pub type TaskId = String;

/// 科研阶段：决定分解使用哪套固定任务模板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Early,
    Middle,
    Late,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Early => "early",
            Stage::Middle => "middle",
            Stage::Late => "late",
        }
    }
}

/// 任务状态机：pending → running → {completed | failed}；终态不可再变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// 目标中的一个任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务 ID
    pub id: TaskId,
    /// 人类可读描述
    pub description: String,
    /// 工具名；None 表示占位任务，直接记为完成
    pub tool: Option<String>,
    /// 任务状态
    pub status: TaskStatus,
    /// 执行结果
    pub result: Option<Value>,
    /// 错误信息
    pub error: Option<String>,
    /// 依赖的任务 id（同一 GoalContext 内、只向后引用）
    pub depends_on: Vec<TaskId>,
}

impl Task {
    pub fn new(description: impl Into<String>, tool: Option<&str>) -> Self {
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            description: description.into(),
            tool: tool.map(String::from),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.depends_on = deps;
        self
    }
}

/// 一次目标执行的完整上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalContext {
    /// 上下文 ID
    pub id: GoalId,
    /// 目标文本
    pub goal: String,
    /// 科研阶段
    pub stage: Stage,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
    /// 按分解顺序排列的任务
    pub tasks: Vec<Task>,
    /// 已完成任务的结果，保持任务数组顺序
    pub results: Vec<Value>,
}

impl GoalContext {
    pub fn new(goal: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: format!("goal_{}", uuid::Uuid::new_v4()),
            goal: goal.into(),
            stage,
            created_at: chrono::Utc::now().timestamp_millis(),
            tasks: Vec::new(),
            results: Vec::new(),
        }
    }

    /// 按 id 查找任务
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 完成任务数 / 总任务数
    pub fn completion_counts(&self) -> (usize, usize) {
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        (done, self.tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_unique() {
        let a = Task::new("a", None);
        let b = Task::new("b", None);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("task_"));
    }

    #[test]
    fn test_stage_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::Early).unwrap(), "\"early\"");
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_completion_counts() {
        let mut ctx = GoalContext::new("test", Stage::Early);
        let mut t1 = Task::new("a", None);
        t1.status = TaskStatus::Completed;
        let t2 = Task::new("b", None);
        ctx.tasks = vec![t1, t2];
        assert_eq!(ctx.completion_counts(), (1, 2));
    }
}
