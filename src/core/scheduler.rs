//! 拓扑并行调度器
//!
//! 与顺序执行同一契约：任务终态、思考步骤、results 顺序（按任务数组序）
//! 均一致，区别仅在无依赖关系的任务可并发执行。依赖计数驱动就绪队列，
//! Semaphore 限制并发 worker 数。依赖 id 只向后引用（分解模板保证），
//! 因此不存在环，就绪队列必然耗尽全部任务。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::core::error::AgentError;
use crate::core::executor::{
    apply_outcome, dependency_results, invoke_tool, mark_unfinished_cancelled, unmet_dependencies,
    TaskOutcome,
};
use crate::core::goal::{GoalContext, TaskStatus};
use crate::core::thinking::{ThinkingKind, ThinkingLog, ThinkingStep};
use crate::tools::{ToolInput, ToolRegistry};

pub(crate) async fn run_parallel(
    tools: Arc<ToolRegistry>,
    thinking: Arc<ThinkingLog>,
    context: &mut GoalContext,
    max_workers: usize,
    tool_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    let n = context.tasks.len();
    let goal = context.goal.clone();
    let stage = context.stage;

    let index_of: HashMap<String, usize> = context
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    // 依赖计数与反向边；解析不到的依赖 id 不参与计数（由未满足检查标记失败）
    let mut blockers = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, task) in context.tasks.iter().enumerate() {
        for dep in &task.depends_on {
            // 自引用不计数，留给未满足检查标记失败
            if let Some(&d) = index_of.get(dep) {
                if d != i {
                    blockers[i] += 1;
                    dependents[d].push(i);
                }
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| blockers[i] == 0).collect();
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(usize, TaskOutcome)>();

    let mut finished = 0usize;
    let mut in_flight = 0usize;

    while finished < n {
        // 就绪任务：可在本地直接终态化的不占 worker
        while let Some(i) = ready.pop_front() {
            let call = {
                let (earlier, rest) = context.tasks.split_at_mut(i);
                let task = &mut rest[0];

                let unmet = unmet_dependencies(task, earlier);
                if !unmet.is_empty() {
                    task.status = TaskStatus::Failed;
                    task.error =
                        Some(AgentError::DependenciesNotMet(unmet.join(", ")).to_string());
                    None
                } else if let Some(tool_name) = task.tool.clone() {
                    if let Some(tool) = tools.get(&tool_name) {
                        task.status = TaskStatus::Running;
                        thinking.emit(
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
                    task.status = TaskStatus::Completed;
                    None
                }
            };

            match call {
                Some((tool, input)) => {
                    in_flight += 1;
                    let semaphore = semaphore.clone();
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        // 取不到 permit 说明 Semaphore 已关闭，进程在收尾
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return;
                        };
                        let outcome = invoke_tool(tool, input, tool_timeout).await;
                        let _ = done_tx.send((i, outcome));
                    });
                }
                None => {
                    finished += 1;
                    release_dependents(i, &context.tasks, &dependents, &mut blockers, &mut ready);
                }
            }
        }

        if finished >= n {
            break;
        }

        debug_assert!(in_flight > 0, "no ready and no in-flight tasks but not finished");

        let received = tokio::select! {
            _ = cancel.cancelled() => None,
            received = done_rx.recv() => received,
        };

        match received {
            Some((i, outcome)) => {
                in_flight -= 1;
                finished += 1;
                apply_outcome(&mut context.tasks[i], outcome, &thinking);
                release_dependents(i, &context.tasks, &dependents, &mut blockers, &mut ready);
            }
            None => {
                // 取消（或所有 sender 消失）：在途 worker 结果直接丢弃
                mark_unfinished_cancelled(&mut context.tasks);
                return Err(AgentError::Cancelled);
            }
        }
    }

    Ok(())
}

/// 任务 i 终态化后递减其后继的依赖计数，计数归零的进就绪队列
fn release_dependents(
    i: usize,
    tasks: &[crate::core::goal::Task],
    dependents: &[Vec<usize>],
    blockers: &mut [usize],
    ready: &mut VecDeque<usize>,
) {
    debug_assert!(tasks[i].status.is_finished());
    for &d in &dependents[i] {
        blockers[d] -= 1;
        if blockers[d] == 0 {
            ready.push_back(d);
        }
    }
}
